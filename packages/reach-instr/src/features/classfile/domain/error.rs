use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header {0:#010x}")]
    InvalidMagic(u32),
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("constant pool exceeds 65535 entries")]
    ConstantPoolOverflow,
    #[error("malformed descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("malformed {attribute} attribute: {reason}")]
    MalformedAttribute {
        attribute: &'static str,
        reason: String,
    },
    #[error("invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: u32 },
    #[error("truncated instruction at offset {0}")]
    TruncatedInstruction(u32),
    #[error("offset {0} is not an instruction boundary")]
    NotAnInstructionBoundary(u32),
    #[error("reserved stack map frame type {0}")]
    InvalidFrameType(u8),
    #[error("invalid verification type tag {0}")]
    InvalidVerificationType(u8),
    #[error("code length {0} exceeds 65535 bytes")]
    CodeTooLarge(usize),
    #[error("branch at offset {at} cannot reach {target} after relocation")]
    BranchOverflow { at: u32, target: u32 },
    #[error("return at offset {0} leaves values on the operand stack")]
    ReturnWithOperands(u32),
    #[error("trailing {0} bytes after class file end")]
    TrailingBytes(usize),
    #[error("I/O error while writing class file: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassFormatError {
    pub(crate) fn attribute(attribute: &'static str, reason: impl Into<String>) -> Self {
        ClassFormatError::MalformedAttribute {
            attribute,
            reason: reason.into(),
        }
    }
}
