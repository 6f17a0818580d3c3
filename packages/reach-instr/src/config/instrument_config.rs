//! Instrumentation settings
//!
//! Defaults, then an optional YAML file (schema v1), then `REACH_INSTR_*`
//! environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use super::io::{ConfigExportV1, SUPPORTED_VERSIONS};
use crate::shared::constants::{format, names};

pub const ENV_WRITE_CODE: &str = "REACH_INSTR_WRITE_CODE";
pub const ENV_DUMP_DIR: &str = "REACH_INSTR_DUMP_DIR";
pub const ENV_FIELD_ANNOTATIONS: &str = "REACH_INSTR_FIELD_ANNOTATIONS";
pub const ENV_INSTRUMENTORS: &str = "REACH_INSTR_INSTRUMENTORS";
pub const ENV_MAX_MAJOR_VERSION: &str = "REACH_INSTR_MAX_MAJOR_VERSION";
pub const ENV_CALLBACK_CLASS: &str = "REACH_INSTR_CALLBACK_CLASS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InstrumentConfig {
    /// Persist generated code and rewritten classes even when nothing failed
    pub write_code: bool,

    /// Root of debug artifacts
    pub dump_dir: PathBuf,

    /// Annotation types (dotted names) attached to the marker field
    pub field_annotations: Vec<String>,

    /// Registry build order
    pub instrumentors: Vec<String>,

    /// Ceiling for the written major version
    pub max_major_version: u16,

    /// Whether the marker field is `final`
    pub marker_final: bool,

    /// Runtime class receiving trace callbacks (dotted name)
    pub callback_class: String,

    /// Stack traces collected per construct; -1 = unlimited
    pub max_stacktraces: i32,

    /// Qualified names that get stack-trace collection
    pub stacktrace_constructs: Vec<String>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            write_code: false,
            dump_dir: std::env::temp_dir().join("reach-instr"),
            field_annotations: Vec::new(),
            instrumentors: vec!["single-trace".to_string()],
            max_major_version: format::JAVA_7,
            marker_final: true,
            callback_class: names::DEFAULT_CALLBACK_CLASS.to_string(),
            max_stacktraces: 10,
            stacktrace_constructs: Vec::new(),
        }
    }
}

impl InstrumentConfig {
    pub fn write_code(mut self, enabled: bool) -> Self {
        self.write_code = enabled;
        self
    }

    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    pub fn field_annotations<I, S>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    pub fn instrumentors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instrumentors = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_major_version(mut self, major: u16) -> Self {
        self.max_major_version = major;
        self
    }

    pub fn marker_final(mut self, is_final: bool) -> Self {
        self.marker_final = is_final;
        self
    }

    pub fn callback_class(mut self, class: impl Into<String>) -> Self {
        self.callback_class = class.into();
        self
    }

    pub fn max_stacktraces(mut self, max: i32) -> Self {
        self.max_stacktraces = max;
        self
    }

    pub fn stacktrace_constructs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stacktrace_constructs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(format::JAVA_1_1..=format::MAX_SUPPORTED).contains(&self.max_major_version) {
            return Err(ConfigError::range_with_hint(
                "max_major_version",
                self.max_major_version,
                format::JAVA_1_1,
                format::MAX_SUPPORTED,
                "Use a released class-file major version (51 = Java 7)",
            ));
        }
        if self.callback_class.trim().is_empty() {
            return Err(ConfigError::Validation(
                "callback_class must name the runtime trace collector".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads a schema-v1 YAML file; a file without an `instrumentation`
    /// section yields the defaults
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        match export.version {
            None => return Err(ConfigError::MissingVersion),
            Some(found) if !SUPPORTED_VERSIONS.contains(&found) => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: SUPPORTED_VERSIONS.to_vec(),
                })
            }
            Some(_) => {}
        }

        let config = export.instrumentation.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            instrumentation: Some(self.clone()),
        };
        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }

    /// Applies `REACH_INSTR_*` variables from the process environment
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Applies overrides from an arbitrary variable lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_WRITE_CODE) {
            self.write_code = parse_bool(ENV_WRITE_CODE, &value)?;
        }
        if let Some(value) = lookup(ENV_DUMP_DIR) {
            self.dump_dir = PathBuf::from(value.trim());
        }
        if let Some(value) = lookup(ENV_FIELD_ANNOTATIONS) {
            self.field_annotations = parse_list(&value);
        }
        if let Some(value) = lookup(ENV_INSTRUMENTORS) {
            self.instrumentors = parse_list(&value);
        }
        if let Some(value) = lookup(ENV_MAX_MAJOR_VERSION) {
            self.max_major_version = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env(ENV_MAX_MAJOR_VERSION, &value, "expected an integer")
            })?;
        }
        if let Some(value) = lookup(ENV_CALLBACK_CLASS) {
            self.callback_class = value.trim().to_string();
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_bool(var: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid_env(var, value, "expected a boolean")),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = InstrumentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_major_version, 51);
        assert_eq!(config.instrumentors, vec!["single-trace"]);
        assert!(config.marker_final);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = InstrumentConfig::default()
            .write_code(true)
            .field_annotations(["javax.persistence.Transient"]);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert_eq!(InstrumentConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
instrumentation:
  write_code: true
  instrumentors: [single-trace, stack-trace]
  max_major_version: 50
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = InstrumentConfig::from_yaml(temp_file.path()).unwrap();
        assert!(config.write_code);
        assert_eq!(config.instrumentors.len(), 2);
        assert_eq!(config.max_major_version, 50);
        // Unset fields keep their defaults
        assert_eq!(config.callback_class, names::DEFAULT_CALLBACK_CLASS);
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = InstrumentConfig::from_yaml_str("instrumentation:\n  write_code: true\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = InstrumentConfig::from_yaml_str("version: 2\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_yaml_unknown_field() {
        let result =
            InstrumentConfig::from_yaml_str("version: 1\ninstrumentation:\n  bogus: 1\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_range_validation() {
        let config = InstrumentConfig::default().max_major_version(99);
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
        let config = InstrumentConfig::default().callback_class("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_WRITE_CODE, "yes"),
            (ENV_FIELD_ANNOTATIONS, " a.B , c.D ,"),
            (ENV_INSTRUMENTORS, "stack-trace"),
            (ENV_MAX_MAJOR_VERSION, "52"),
        ]
        .into_iter()
        .collect();
        let config = InstrumentConfig::default()
            .with_overrides_from(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert!(config.write_code);
        assert_eq!(config.field_annotations, vec!["a.B", "c.D"]);
        assert_eq!(config.instrumentors, vec!["stack-trace"]);
        assert_eq!(config.max_major_version, 52);
    }

    #[test]
    fn test_env_invalid_values() {
        let result = InstrumentConfig::default()
            .with_overrides_from(|var| (var == ENV_WRITE_CODE).then(|| "maybe".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));

        let result = InstrumentConfig::default()
            .with_overrides_from(|var| (var == ENV_MAX_MAJOR_VERSION).then(|| "x".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
