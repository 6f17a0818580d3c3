//! Instrumentation infrastructure
//!
//! - `codegen`      - Fragment lowering and runtime guard
//! - `debug_dump`   - Best-effort debug artifacts
//! - `digest`       - Archive digests for the injection context
//! - `pretty_print` - Source layout for debug artifacts
//! - `registry`     - Process-wide instrumentor registry

pub mod codegen;
pub mod debug_dump;
pub mod digest;
pub mod pretty_print;
pub mod registry;

pub use codegen::{lower_guarded, LoweringTarget};
pub use digest::archive_digest;
pub use pretty_print::pretty_print;
pub use registry::{global_registry, init_global_registry};
