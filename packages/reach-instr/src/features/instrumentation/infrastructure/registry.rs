//! Process-wide instrumentor registry

use std::sync::{Arc, OnceLock};

use crate::config::global_config;
use crate::features::instrumentation::plugins::build_registry;
use crate::features::instrumentation::ports::InstrumentorRegistry;

/// Global singleton registry
static GLOBAL_REGISTRY: OnceLock<Arc<InstrumentorRegistry>> = OnceLock::new();

/// Get or build the global registry from the global configuration
pub fn global_registry() -> Arc<InstrumentorRegistry> {
    GLOBAL_REGISTRY
        .get_or_init(|| Arc::new(build_registry(&global_config())))
        .clone()
}

/// Install an explicit global registry
///
/// **NOTE**: Can only be called once, before first use! Returns false otherwise.
pub fn init_global_registry(registry: InstrumentorRegistry) -> bool {
    GLOBAL_REGISTRY.set(Arc::new(registry)).is_ok()
}
