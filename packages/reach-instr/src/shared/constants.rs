//! Centralized constants
//!
//! Class-file format numbers, well-known names, and defaults used by the
//! instrumentation engine.

/// Class-file format versions (major)
pub mod format {
    /// JDK 1.1, the oldest major version the reader accepts
    pub const JAVA_1_1: u16 = 45;

    /// First version allowing `ldc` of class constants
    pub const JAVA_5: u16 = 49;

    /// First version carrying StackMapTable frames
    pub const JAVA_6: u16 = 50;

    /// Default output ceiling
    pub const JAVA_7: u16 = 51;

    /// Highest major version accepted as a configured ceiling
    pub const MAX_SUPPORTED: u16 = 69;
}

/// Access flags shared by classes, fields and methods
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
}

/// Well-known member and type names
pub mod names {
    /// Static field whose presence marks a class as instrumented
    pub const MARKER_FIELD: &str = "VUL_CLS_INS";

    /// Only exception allowed to escape injected code
    pub const CONTROL_EXCEPTION: &str = "java/lang/IllegalStateException";

    pub const THROWABLE: &str = "java/lang/Throwable";
    pub const CONSTRUCTOR: &str = "<init>";
    pub const STATIC_INITIALIZER: &str = "<clinit>";

    /// Default runtime class receiving trace callbacks
    pub const DEFAULT_CALLBACK_CLASS: &str = "reach.runtime.TraceCollector";
}

/// Prefixes of generated member names
pub mod members {
    pub const TRACE_FLAG_PREFIX: &str = "VUL_TRC";
    pub const STACKTRACE_COUNTER_PREFIX: &str = "VUL_ST_COUNT";
}
