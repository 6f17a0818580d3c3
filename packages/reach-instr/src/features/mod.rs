//! Feature modules
//!
//! - `classfile/`       - Lossless class-file codec and bytecode relocation
//! - `construct_id/`    - Canonical construct identities and name canonicalization
//! - `instrumentation/` - Type descriptor, instrumentor registry, splicing, finalization

pub mod classfile;
pub mod construct_id;
pub mod instrumentation;
