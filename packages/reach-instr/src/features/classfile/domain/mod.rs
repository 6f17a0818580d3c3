//! Class-file domain model
//!
//! Owned, editable representation of one compiled type. Attributes that the
//! engine never edits are kept as raw bytes so that an unmodified class
//! serializes back to the exact input.

mod class_file;
mod code;
mod constant_pool;
mod descriptor;
mod error;
pub mod mutf8;

pub use class_file::{AttributeInfo, ClassFile, MemberInfo, Nesting};
pub use code::{CodeAttribute, ExceptionEntry};
pub use constant_pool::{Constant, ConstantPool};
pub use descriptor::{FieldType, MethodDescriptor};
pub use error::ClassFormatError;
