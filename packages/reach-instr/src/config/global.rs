//! Process-wide configuration

use std::sync::{Arc, OnceLock};

use tracing::warn;

use super::InstrumentConfig;

/// Global singleton configuration
static GLOBAL_CONFIG: OnceLock<Arc<InstrumentConfig>> = OnceLock::new();

/// Get or initialize the global configuration (defaults plus environment)
pub fn global_config() -> Arc<InstrumentConfig> {
    GLOBAL_CONFIG
        .get_or_init(|| {
            let config = InstrumentConfig::default()
                .with_env_overrides()
                .unwrap_or_else(|err| {
                    warn!(error = %err, "ignoring invalid environment overrides");
                    InstrumentConfig::default()
                });
            Arc::new(config)
        })
        .clone()
}

/// Install an explicit global configuration
///
/// **NOTE**: Can only be called once, before first use! Returns false otherwise.
pub fn init_global_config(config: InstrumentConfig) -> bool {
    GLOBAL_CONFIG.set(Arc::new(config)).is_ok()
}
