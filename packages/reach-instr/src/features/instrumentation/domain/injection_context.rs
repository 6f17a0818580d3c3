//! Literal values embedded into generated callbacks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maven-style coordinates of the application under analysis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppCoordinates {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl AppCoordinates {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for AppCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for AppCoordinates {
    type Err = String;

    /// `group:artifact:version`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(AppCoordinates::new(*group, *artifact, *version))
            }
            _ => Err(format!(
                "Invalid application coordinates: {} (expected group:artifact:version)",
                s
            )),
        }
    }
}

/// Set once per descriptor, before any construct is instrumented
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionContext {
    /// Digest of the archive the class was loaded from
    pub archive_digest: Option<String>,
    pub app: Option<AppCoordinates>,
}

impl InjectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive_digest(mut self, digest: impl Into<String>) -> Self {
        self.archive_digest = Some(digest.into());
        self
    }

    pub fn with_app(mut self, app: AppCoordinates) -> Self {
        self.app = Some(app);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.archive_digest.is_none() && self.app.is_none()
    }

    pub fn group(&self) -> Option<&str> {
        self.app.as_ref().map(|app| app.group.as_str())
    }

    pub fn artifact(&self) -> Option<&str> {
        self.app.as_ref().map(|app| app.artifact.as_str())
    }

    pub fn version(&self) -> Option<&str> {
        self.app.as_ref().map(|app| app.version.as_str())
    }
}
