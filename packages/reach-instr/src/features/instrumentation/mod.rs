//! Instrumentation feature
//!
//! Drives pluggable instrumentors over the behaviors of one compiled type,
//! splices their guarded fragments into the bytecode and finalizes the
//! type with an idempotency marker.
//!
//! ## Structure
//! - `domain/` - Behavior, InstrumentationFragment, InjectionContext
//! - `ports/` - Instrumentor trait and registry
//! - `application/` - TypeDescriptor, finalization, batch driver
//! - `infrastructure/` - Code generation, debug artifacts, digests, global registry
//! - `plugins/` - Built-in instrumentors (`single-trace`, `stack-trace`)
//!
//! ## Usage
//! ```no_run
//! use reach_instr::TypeDescriptor;
//!
//! # fn run(bytes: &[u8]) -> reach_instr::Result<Vec<u8>> {
//! let mut descriptor = TypeDescriptor::from_bytes(bytes)?;
//! descriptor.visit_constructors(true)?;
//! descriptor.visit_methods(true)?;
//! descriptor.finalize()?;
//! descriptor.bytecode()
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
pub mod ports;

pub use application::{instrument_batch, BatchInput, BatchItem, BatchOptions, TypeDescriptor};
pub use domain::{
    AppCoordinates, Argument, Behavior, BehaviorKind, InjectionContext, InstrumentationFragment,
    MemberDecl, MemberKind, Statement, StaticCall,
};
pub use infrastructure::{archive_digest, global_registry, init_global_registry, pretty_print};
pub use plugins::{build_registry, create_instrumentor, SingleTraceInstrumentor, StackTraceInstrumentor};
pub use ports::{Instrumentor, InstrumentorRegistry};
