//! Error types for reach-instr
//!
//! Provides unified error handling across the crate.

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::classfile::ClassFormatError;

/// Main error type for reach-instr operations
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// Interfaces (and annotation types) cannot be analysed or instrumented
    #[error("[{type_name}]: interfaces are not supported")]
    UnsupportedConstructKind { type_name: String },

    /// Nested, non-static type without a resolvable enclosing type.
    /// Recorded as a warning; constructor signatures keep the synthetic parameter.
    #[error("no enclosing type found for non-static nested type [{type_name}]")]
    EnclosingTypeUnresolved { type_name: String },

    /// Signature text without round brackets
    #[error("signature has no round brackets: [{0}]")]
    InvalidSignature(String),

    /// The guarded block could not be spliced into a construct
    #[error("cannot inject instrumentation code into {construct}: {reason}")]
    InjectionFailure { construct: String, reason: String },

    /// Bytecode requested before `finalize()`
    #[error("bytecode requested before finalize() was called")]
    NotFinalized,

    /// The class representation was detached by `finalize()`
    #[error("type descriptor [{0}] has already been finalized")]
    Finalized(String),

    /// Injection context can only be set once, before any instrumentation
    #[error("injection context of [{0}] is already fixed")]
    ContextLocked(String),

    /// Class-file codec error
    #[error("class format error: {0}")]
    ClassFormat(#[from] ClassFormatError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstrumentError {
    /// Create an injection failure for the given construct
    pub fn injection(construct: impl ToString, reason: impl Into<String>) -> Self {
        InstrumentError::InjectionFailure {
            construct: construct.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures confined to a single construct
    pub fn is_construct_local(&self) -> bool {
        matches!(self, InstrumentError::InjectionFailure { .. })
    }
}

/// Result type alias for reach-instr operations
pub type Result<T> = std::result::Result<T, InstrumentError>;
