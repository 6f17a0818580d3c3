//! Built-in instrumentors
//!
//! Configuration names map to implementations through a compile-time
//! table; there is no loading by class name.
//!
//! - `single-trace` - one callback per construct and class load
//! - `stack-trace`  - bounded callbacks for selected constructs

pub mod single_trace;
pub mod stack_trace;

pub use single_trace::SingleTraceInstrumentor;
pub use stack_trace::StackTraceInstrumentor;

use tracing::{info, warn};

use crate::config::{ConfigError, InstrumentConfig};
use crate::errors::Result;
use crate::features::construct_id::ConstructId;
use crate::features::instrumentation::application::TypeDescriptor;
use crate::features::instrumentation::domain::{Argument, StaticCall};
use crate::features::instrumentation::ports::{Instrumentor, InstrumentorRegistry};

/// `(String kind, String qname, Class cls, String digest, String group, String artifact, String version)`
pub const CALLBACK_DESCRIPTOR: &str = "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/Class;\
Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V";

/// Names accepted in the `instrumentors` list
pub const KNOWN_INSTRUMENTORS: &[&str] = &[SingleTraceInstrumentor::NAME, StackTraceInstrumentor::NAME];

/// Create one instrumentor by configuration name
pub fn create_instrumentor(name: &str, config: &InstrumentConfig) -> Result<Box<dyn Instrumentor>> {
    match name {
        SingleTraceInstrumentor::NAME => Ok(Box::new(SingleTraceInstrumentor::new(config))),
        StackTraceInstrumentor::NAME => Ok(Box::new(StackTraceInstrumentor::new(config)?)),
        other => Err(ConfigError::Validation(format!(
            "unknown instrumentor '{}' (known: {})",
            other,
            KNOWN_INSTRUMENTORS.join(", ")
        ))
        .into()),
    }
}

/// Create a registry in configuration order; entries that fail are skipped
pub fn build_registry(config: &InstrumentConfig) -> InstrumentorRegistry {
    let mut registry = InstrumentorRegistry::new();
    for name in &config.instrumentors {
        match create_instrumentor(name, config) {
            Ok(instrumentor) => registry.register(instrumentor),
            Err(err) => warn!(instrumentor = %name, error = %err, "skipping instrumentor"),
        }
    }
    info!(instrumentors = ?registry.names(), "instrumentor registry built");
    registry
}

/// Static call to `<callback_class>.<method>` carrying the construct and
/// the descriptor's injection context
pub(crate) fn trace_callback(
    callback_class: &str,
    method: &str,
    construct: &ConstructId,
    descriptor: &TypeDescriptor,
) -> StaticCall {
    let context = descriptor.injection_context();
    StaticCall::new(
        callback_class,
        method,
        CALLBACK_DESCRIPTOR,
        vec![
            Argument::Str(construct.kind().as_str().to_string()),
            Argument::Str(construct.qualified_name()),
            Argument::ThisClass,
            Argument::optional_str(context.archive_digest.as_deref()),
            Argument::optional_str(context.group()),
            Argument::optional_str(context.artifact()),
            Argument::optional_str(context.version()),
        ],
    )
}
