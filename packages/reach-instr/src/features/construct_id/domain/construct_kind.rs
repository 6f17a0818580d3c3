//! Construct kind enumeration
//!
//! Four-letter tags used in canonical identities and JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructKind {
    #[serde(rename = "PACK")]
    Package,
    #[serde(rename = "CLAS")]
    Class,
    #[serde(rename = "ENUM")]
    Enum,
    /// Static initializer (`<clinit>`)
    #[serde(rename = "INIT")]
    StaticInitializer,
    #[serde(rename = "CONS")]
    Constructor,
    #[serde(rename = "METH")]
    Method,
}

impl ConstructKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Package => "PACK",
            ConstructKind::Class => "CLAS",
            ConstructKind::Enum => "ENUM",
            ConstructKind::StaticInitializer => "INIT",
            ConstructKind::Constructor => "CONS",
            ConstructKind::Method => "METH",
        }
    }

    /// Kinds with a body that can receive instrumentation
    pub fn is_behavior(&self) -> bool {
        matches!(
            self,
            ConstructKind::StaticInitializer | ConstructKind::Constructor | ConstructKind::Method
        )
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConstructKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PACK" => Ok(ConstructKind::Package),
            "CLAS" => Ok(ConstructKind::Class),
            "ENUM" => Ok(ConstructKind::Enum),
            "INIT" => Ok(ConstructKind::StaticInitializer),
            "CONS" => Ok(ConstructKind::Constructor),
            "METH" => Ok(ConstructKind::Method),
            _ => Err(format!("Unknown construct kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(ConstructKind::Method.as_str(), "METH");
        assert_eq!(ConstructKind::StaticInitializer.to_string(), "INIT");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("cons".parse::<ConstructKind>().unwrap(), ConstructKind::Constructor);
        assert!("INTF".parse::<ConstructKind>().is_err());
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&ConstructKind::Enum).unwrap();
        assert_eq!(json, "\"ENUM\"");
        let back: ConstructKind = serde_json::from_str("\"PACK\"").unwrap();
        assert_eq!(back, ConstructKind::Package);
    }
}
