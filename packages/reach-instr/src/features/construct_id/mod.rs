//! Construct Identity feature
//!
//! Canonical, package-stripped identities for everything a compiled type
//! declares.
//!
//! ## Structure
//! - `domain/` - ConstructId, ConstructKind, filters
//! - `infrastructure/` - Regex-based name canonicalizer

pub mod domain;
pub mod infrastructure;

pub use domain::{
    filter_by_kind, filter_by_owner, filter_by_prefix, ConstructId, ConstructKind, LANGUAGE,
};
pub use infrastructure::{
    remove_package_context, split_parameter_types, strip_parameter_qualification,
    strip_signature_qualification,
};
