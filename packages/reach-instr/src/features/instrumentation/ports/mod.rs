//! Instrumentation ports

mod instrumentor;

pub use instrumentor::{Instrumentor, InstrumentorRegistry};
