//! Class-File Feature
//!
//! Reads, edits and writes compiled JVM types without losing information.
//!
//! ## Structure
//! - `domain/` - ClassFile, ConstantPool, Code attribute, descriptors
//! - `infrastructure/` - Byte reader, instruction decoder, relocation, stack maps

pub mod domain;
pub mod infrastructure;

pub use domain::{
    AttributeInfo, ClassFile, ClassFormatError, CodeAttribute, Constant, ConstantPool,
    ExceptionEntry, FieldType, MemberInfo, MethodDescriptor, Nesting,
};
pub use infrastructure::{
    decode_instructions, initial_locals, op, splice, Instruction, Placement, SpliceBlock,
    SpliceRequest, StackMapFrame, VerificationType,
};
