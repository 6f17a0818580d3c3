//! Shared module - Common constants
//!
//! Values shared by the class-file codec and the instrumentation feature.

pub mod constants;
