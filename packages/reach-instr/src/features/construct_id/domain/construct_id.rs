//! Construct identities
//!
//! Immutable value objects naming a package, type, static initializer,
//! constructor or method. Equality, ordering and hashing all use the
//! canonical string `JAVA <TAG> [<qualified name>]`, so two identities
//! are equal exactly when their canonical strings are.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ConstructKind;
use crate::errors::{InstrumentError, Result};
use crate::features::construct_id::infrastructure::split_parameter_types;

/// Language tag carried by every identity
pub const LANGUAGE: &str = "JAVA";

#[derive(Debug, Clone)]
pub enum ConstructId {
    Package {
        qualified_name: String,
    },
    Type {
        /// Dotted, with `$` for nesting: `a.b.Outer$Inner`
        qualified_name: String,
        is_enum: bool,
    },
    StaticInitializer {
        owner: String,
    },
    Constructor {
        owner: String,
        parameters: Vec<String>,
        /// The compiler-added enclosing-instance parameter was removed
        elided_outer_param: bool,
    },
    Method {
        owner: String,
        name: String,
        parameters: Vec<String>,
    },
}

impl ConstructId {
    pub fn package(qualified_name: impl Into<String>) -> Self {
        ConstructId::Package {
            qualified_name: qualified_name.into(),
        }
    }

    pub fn of_type(qualified_name: impl Into<String>, is_enum: bool) -> Self {
        ConstructId::Type {
            qualified_name: qualified_name.into(),
            is_enum,
        }
    }

    pub fn static_initializer(owner: impl Into<String>) -> Self {
        ConstructId::StaticInitializer {
            owner: owner.into(),
        }
    }

    pub fn constructor(
        owner: impl Into<String>,
        parameters: Vec<String>,
        elided_outer_param: bool,
    ) -> Self {
        ConstructId::Constructor {
            owner: owner.into(),
            parameters,
            elided_outer_param,
        }
    }

    pub fn method(owner: impl Into<String>, name: impl Into<String>, parameters: Vec<String>) -> Self {
        ConstructId::Method {
            owner: owner.into(),
            name: name.into(),
            parameters,
        }
    }

    /// Package identity of a dotted type name; `None` for the default package
    pub fn package_of(type_name: &str) -> Option<Self> {
        type_name
            .rsplit_once('.')
            .map(|(package, _)| package)
            .filter(|package| !package.is_empty())
            .map(ConstructId::package)
    }

    /// Rebuilds an identity from its kind and qualified name
    pub fn from_qualified(kind: ConstructKind, qualified_name: &str) -> Result<Self> {
        let invalid = || InstrumentError::InvalidSignature(qualified_name.to_string());
        if qualified_name.is_empty() {
            return Err(invalid());
        }

        match kind {
            ConstructKind::Package => Ok(ConstructId::package(qualified_name)),
            ConstructKind::Class => Ok(ConstructId::of_type(qualified_name, false)),
            ConstructKind::Enum => Ok(ConstructId::of_type(qualified_name, true)),
            ConstructKind::StaticInitializer => qualified_name
                .strip_suffix(".<clinit>")
                .filter(|owner| !owner.is_empty())
                .map(ConstructId::static_initializer)
                .ok_or_else(invalid),
            ConstructKind::Constructor => {
                let (owner, parameters) = split_signature(qualified_name).ok_or_else(invalid)?;
                Ok(ConstructId::constructor(
                    owner,
                    split_parameter_types(parameters),
                    false,
                ))
            }
            ConstructKind::Method => {
                let (prefix, parameters) = split_signature(qualified_name).ok_or_else(invalid)?;
                let (owner, name) = prefix.rsplit_once('.').ok_or_else(invalid)?;
                Ok(ConstructId::method(owner, name, split_parameter_types(parameters)))
            }
        }
    }

    pub fn kind(&self) -> ConstructKind {
        match self {
            ConstructId::Package { .. } => ConstructKind::Package,
            ConstructId::Type { is_enum: true, .. } => ConstructKind::Enum,
            ConstructId::Type { .. } => ConstructKind::Class,
            ConstructId::StaticInitializer { .. } => ConstructKind::StaticInitializer,
            ConstructId::Constructor { .. } => ConstructKind::Constructor,
            ConstructId::Method { .. } => ConstructKind::Method,
        }
    }

    /// `a.b` / `a.b.C` / `a.b.C.<clinit>` / `a.b.C(int)` / `a.b.C.m(int)`
    pub fn qualified_name(&self) -> String {
        match self {
            ConstructId::Package { qualified_name } | ConstructId::Type { qualified_name, .. } => {
                qualified_name.clone()
            }
            ConstructId::StaticInitializer { owner } => format!("{owner}.<clinit>"),
            ConstructId::Constructor {
                owner, parameters, ..
            } => format!("{owner}({})", parameters.join(",")),
            ConstructId::Method {
                owner,
                name,
                parameters,
            } => format!("{owner}.{name}({})", parameters.join(",")),
        }
    }

    /// Declaring type of behaviors
    pub fn owner(&self) -> Option<&str> {
        match self {
            ConstructId::StaticInitializer { owner }
            | ConstructId::Constructor { owner, .. }
            | ConstructId::Method { owner, .. } => Some(owner),
            _ => None,
        }
    }

    /// Method name, `<init>`, `<clinit>`, or the last segment of a type/package name
    pub fn simple_name(&self) -> &str {
        match self {
            ConstructId::Package { qualified_name } => qualified_name
                .rsplit_once('.')
                .map_or(qualified_name.as_str(), |(_, last)| last),
            ConstructId::Type { qualified_name, .. } => qualified_name
                .rsplit(['.', '$'])
                .next()
                .unwrap_or(qualified_name.as_str()),
            ConstructId::StaticInitializer { .. } => "<clinit>",
            ConstructId::Constructor { .. } => "<init>",
            ConstructId::Method { name, .. } => name,
        }
    }

    pub fn parameters(&self) -> &[String] {
        match self {
            ConstructId::Constructor { parameters, .. } | ConstructId::Method { parameters, .. } => {
                parameters
            }
            _ => &[],
        }
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

/// `(owner, parameter text)` for `owner(params)`
fn split_signature(qualified_name: &str) -> Option<(&str, &str)> {
    let open = qualified_name.find('(')?;
    let inner = qualified_name[open + 1..].strip_suffix(')')?;
    let owner = &qualified_name[..open];
    (!owner.is_empty()).then_some((owner, inner))
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LANGUAGE} {} [{}]", self.kind(), self.qualified_name())
    }
}

impl PartialEq for ConstructId {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.qualified_name() == other.qualified_name()
    }
}

impl Eq for ConstructId {}

impl Ord for ConstructId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl PartialOrd for ConstructId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ConstructId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

#[derive(Serialize, Deserialize)]
struct ConstructIdRecord {
    lang: String,
    #[serde(rename = "type")]
    kind: ConstructKind,
    qname: String,
}

impl Serialize for ConstructId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ConstructIdRecord {
            lang: LANGUAGE.to_string(),
            kind: self.kind(),
            qname: self.qualified_name(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConstructId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = ConstructIdRecord::deserialize(deserializer)?;
        if record.lang != LANGUAGE {
            return Err(serde::de::Error::custom(format!(
                "unsupported language [{}]",
                record.lang
            )));
        }
        ConstructId::from_qualified(record.kind, &record.qname).map_err(serde::de::Error::custom)
    }
}

/// Identities of any of the given kinds
pub fn filter_by_kind<'a>(
    constructs: impl IntoIterator<Item = &'a ConstructId>,
    kinds: &[ConstructKind],
) -> BTreeSet<ConstructId> {
    constructs
        .into_iter()
        .filter(|c| kinds.contains(&c.kind()))
        .cloned()
        .collect()
}

/// Identities whose qualified name starts with any of the prefixes
pub fn filter_by_prefix<'a>(
    constructs: impl IntoIterator<Item = &'a ConstructId>,
    prefixes: &[&str],
) -> BTreeSet<ConstructId> {
    constructs
        .into_iter()
        .filter(|c| {
            let name = c.qualified_name();
            prefixes.iter().any(|p| name.starts_with(p))
        })
        .cloned()
        .collect()
}

/// Methods and constructors declared by `owner`
pub fn filter_by_owner<'a>(
    constructs: impl IntoIterator<Item = &'a ConstructId>,
    owner: &str,
) -> BTreeSet<ConstructId> {
    constructs
        .into_iter()
        .filter(|c| {
            matches!(c.kind(), ConstructKind::Constructor | ConstructKind::Method)
                && c.owner() == Some(owner)
        })
        .cloned()
        .collect()
}
