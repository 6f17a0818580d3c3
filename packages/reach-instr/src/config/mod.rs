//! Configuration System
//!
//! Three layers, later ones winning:
//! - Defaults (`InstrumentConfig::default()`)
//! - YAML file, schema v1 (`InstrumentConfig::from_yaml`)
//! - `REACH_INSTR_*` environment variables (`with_env_overrides`)
//!
//! # Examples
//!
//! ```rust,ignore
//! use reach_instr::config::InstrumentConfig;
//!
//! let config = InstrumentConfig::from_yaml("instr.yaml")?
//!     .with_env_overrides()?;
//! ```
//!
//! ```yaml
//! version: 1
//! instrumentation:
//!   write_code: false
//!   instrumentors: [single-trace]
//!   max_major_version: 51
//!   field_annotations: [javax.persistence.Transient]
//! ```

pub mod error;
pub mod global;
pub mod instrument_config;
pub mod io;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use global::{global_config, init_global_config};
pub use instrument_config::InstrumentConfig;
pub use io::ConfigExportV1;
