//! Canonicalization of raw signature text

pub mod canonicalizer;

pub use canonicalizer::{
    remove_package_context, split_parameter_types, strip_parameter_qualification,
    strip_signature_qualification,
};
