//! Instrumentation use cases
//!
//! - `type_descriptor` - Per-type analysis and construct instrumentation
//! - `finalizer`       - Marker field, version cap, serialization
//! - `batch`           - Parallel processing of many types

pub mod batch;
pub mod finalizer;
pub mod type_descriptor;

pub use batch::{instrument_batch, BatchInput, BatchItem, BatchOptions};
pub use type_descriptor::TypeDescriptor;
