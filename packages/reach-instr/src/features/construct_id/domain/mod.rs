//! Construct identity domain models

pub mod construct_id;
pub mod construct_kind;

pub use construct_id::{filter_by_kind, filter_by_owner, filter_by_prefix, ConstructId, LANGUAGE};
pub use construct_kind::ConstructKind;
