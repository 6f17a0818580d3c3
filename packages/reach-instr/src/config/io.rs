//! Configuration I/O (YAML schema types)
//!
//! Loading and export live on `InstrumentConfig`.

use super::InstrumentConfig;
use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1); optional here so that a missing
    /// field is reported as `MissingVersion`
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentation: Option<InstrumentConfig>,
}

/// Supported schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];
