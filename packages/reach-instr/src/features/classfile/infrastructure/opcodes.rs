//! Instruction decoding
//!
//! Only boundaries and lengths are decoded; operands stay in the code array.

use crate::features::classfile::domain::ClassFormatError;

/// Opcodes emitted or rewritten by the engine
pub mod op {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const ALOAD_0: u8 = 0x2a;
    pub const DUP: u8 = 0x59;
    pub const DUP_X1: u8 = 0x5a;
    pub const SWAP: u8 = 0x5f;
    pub const IADD: u8 = 0x60;
    pub const IFEQ: u8 = 0x99;
    pub const IFNE: u8 = 0x9a;
    pub const IF_ICMPGE: u8 = 0xa2;
    pub const GOTO: u8 = 0xa7;
    pub const JSR: u8 = 0xa8;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const NEW: u8 = 0xbb;
    pub const ATHROW: u8 = 0xbf;
    pub const WIDE: u8 = 0xc4;
    pub const IINC: u8 = 0x84;
    pub const IFNULL: u8 = 0xc6;
    pub const IFNONNULL: u8 = 0xc7;
    pub const GOTO_W: u8 = 0xc8;
    pub const JSR_W: u8 = 0xc9;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub length: u32,
}

impl Instruction {
    /// Conditional branches, `goto`, `jsr`, `ifnull`, `ifnonnull`
    pub fn has_branch16(&self) -> bool {
        matches!(self.opcode, 0x99..=0xa8 | op::IFNULL | op::IFNONNULL)
    }

    pub fn has_branch32(&self) -> bool {
        matches!(self.opcode, op::GOTO_W | op::JSR_W)
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.opcode, op::TABLESWITCH | op::LOOKUPSWITCH)
    }
}

/// Zero bytes between a switch opcode at `offset` and its 4-byte aligned operands
pub fn switch_padding(offset: u32) -> u32 {
    (4 - ((offset + 1) % 4)) % 4
}

pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, ClassFormatError> {
    let mut instructions = Vec::with_capacity(code.len() / 2);
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let length = instruction_length(code, offset)?;
        if offset + length > code.len() {
            return Err(ClassFormatError::TruncatedInstruction(offset as u32));
        }
        instructions.push(Instruction {
            offset: offset as u32,
            opcode,
            length: length as u32,
        });
        offset += length;
    }
    Ok(instructions)
}

fn instruction_length(code: &[u8], offset: usize) -> Result<usize, ClassFormatError> {
    let opcode = code[offset];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x12 => 2,
        0x13..=0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        0x84 => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        op::TABLESWITCH => {
            let operands = offset + 1 + switch_padding(offset as u32) as usize;
            let low = read_i32(code, operands + 4, offset)?;
            let high = read_i32(code, operands + 8, offset)?;
            if high < low {
                return Err(ClassFormatError::attribute(
                    "Code",
                    format!("tableswitch at {offset} has high < low"),
                ));
            }
            let entries = (high as i64 - low as i64 + 1) as usize;
            operands - offset + 12 + entries * 4
        }
        op::LOOKUPSWITCH => {
            let operands = offset + 1 + switch_padding(offset as u32) as usize;
            let npairs = read_i32(code, operands + 4, offset)?;
            if npairs < 0 {
                return Err(ClassFormatError::attribute(
                    "Code",
                    format!("lookupswitch at {offset} has negative npairs"),
                ));
            }
            operands - offset + 8 + npairs as usize * 8
        }
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        op::WIDE => match code.get(offset + 1) {
            Some(&op::IINC) => 6,
            Some(_) => 4,
            None => return Err(ClassFormatError::TruncatedInstruction(offset as u32)),
        },
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        _ => {
            return Err(ClassFormatError::InvalidOpcode {
                opcode,
                offset: offset as u32,
            })
        }
    };
    Ok(length)
}

fn read_i32(code: &[u8], at: usize, instruction: usize) -> Result<i32, ClassFormatError> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ClassFormatError::TruncatedInstruction(instruction as u32))
}
