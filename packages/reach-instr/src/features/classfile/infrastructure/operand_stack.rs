//! Operand stack depth per instruction
//!
//! Depth is counted in slots, `long` and `double` taking two. Exception
//! handlers start at depth one; a `jsr` target sees the return address.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};

use super::opcodes::{op, switch_padding, Instruction};
use crate::features::classfile::domain::{
    ClassFormatError, CodeAttribute, ConstantPool, FieldType, MethodDescriptor,
};

const RET: u8 = 0xa9;

enum Flow {
    Next,
    /// Targets plus fall-through
    Branch(Vec<u32>),
    /// Targets only
    Jump(Vec<u32>),
    Subroutine(u32),
    End,
}

/// Offset of the first void `return` reached with values still on the stack
pub(crate) fn loaded_return(
    code: &CodeAttribute,
    instructions: &[Instruction],
    pool: &ConstantPool,
) -> Result<Option<u32>, ClassFormatError> {
    let index_of: HashMap<u32, usize> = instructions
        .iter()
        .enumerate()
        .map(|(index, insn)| (insn.offset, index))
        .collect();
    let end = code.code.len() as u32;

    let mut depths: Vec<Option<i32>> = vec![None; instructions.len()];
    let mut pending: Vec<(u32, i32)> = code
        .exception_table
        .iter()
        .map(|entry| (u32::from(entry.handler_pc), 1))
        .collect();
    pending.push((0, 0));

    let mut loaded: Option<u32> = None;
    while let Some((offset, depth)) = pending.pop() {
        if offset == end {
            continue;
        }
        let index = *index_of
            .get(&offset)
            .ok_or(ClassFormatError::NotAnInstructionBoundary(offset))?;
        if depths[index].is_some() {
            continue;
        }
        depths[index] = Some(depth);

        let insn = &instructions[index];
        if insn.opcode == op::RETURN && depth > 0 {
            loaded = Some(loaded.map_or(offset, |first| first.min(offset)));
        }
        let after = depth + stack_delta(&code.code, insn, pool)?;
        if after < 0 {
            return Err(ClassFormatError::attribute(
                "Code",
                format!("operand stack underflow at offset {offset}"),
            ));
        }

        let next = insn.offset + insn.length;
        match flow(&code.code, insn) {
            Flow::Next => pending.push((next, after)),
            Flow::Branch(targets) => {
                pending.push((next, after));
                pending.extend(targets.into_iter().map(|target| (target, after)));
            }
            Flow::Jump(targets) => {
                pending.extend(targets.into_iter().map(|target| (target, after)));
            }
            Flow::Subroutine(target) => {
                pending.push((next, after));
                pending.push((target, after + 1));
            }
            Flow::End => {}
        }
    }
    Ok(loaded)
}

fn flow(code: &[u8], insn: &Instruction) -> Flow {
    let at = insn.offset as usize;
    let target = |relative: i32| (insn.offset as i64 + relative as i64) as u32;

    if insn.has_branch16() {
        let destination = target(BigEndian::read_i16(&code[at + 1..at + 3]) as i32);
        return match insn.opcode {
            op::GOTO => Flow::Jump(vec![destination]),
            op::JSR => Flow::Subroutine(destination),
            _ => Flow::Branch(vec![destination]),
        };
    }
    if insn.has_branch32() {
        let destination = target(BigEndian::read_i32(&code[at + 1..at + 5]));
        return match insn.opcode {
            op::JSR_W => Flow::Subroutine(destination),
            _ => Flow::Jump(vec![destination]),
        };
    }
    if insn.is_switch() {
        let operands = &code[at + 1 + switch_padding(insn.offset) as usize..];
        let read = |i: usize| BigEndian::read_i32(&operands[i * 4..i * 4 + 4]);
        let mut targets = vec![target(read(0))];
        if insn.opcode == op::TABLESWITCH {
            let entries = (read(2) as i64 - read(1) as i64 + 1) as usize;
            targets.extend((0..entries).map(|i| target(read(3 + i))));
        } else {
            let npairs = read(1) as usize;
            targets.extend((0..npairs).map(|i| target(read(3 + i * 2))));
        }
        return Flow::Jump(targets);
    }
    match insn.opcode {
        RET | 0xac..=0xb1 | op::ATHROW => Flow::End,
        op::WIDE if code[at + 1] == RET => Flow::End,
        _ => Flow::Next,
    }
}

fn stack_delta(
    code: &[u8],
    insn: &Instruction,
    pool: &ConstantPool,
) -> Result<i32, ClassFormatError> {
    let at = insn.offset as usize;
    let index = || BigEndian::read_u16(&code[at + 1..at + 3]);
    let delta = match insn.opcode {
        0x00 => 0,
        0x01..=0x08 | 0x0b..=0x0d | 0x10..=0x13 => 1,
        0x09 | 0x0a | 0x0e | 0x0f | 0x14 => 2,
        // loads
        0x15 | 0x17 | 0x19 | 0x1a..=0x1d | 0x22..=0x25 | 0x2a..=0x2d => 1,
        0x16 | 0x18 | 0x1e..=0x21 | 0x26..=0x29 => 2,
        // array loads
        0x2f | 0x31 => 0,
        0x2e | 0x30 | 0x32..=0x35 => -1,
        // stores
        0x36 | 0x38 | 0x3a | 0x3b..=0x3e | 0x43..=0x46 | 0x4b..=0x4e => -1,
        0x37 | 0x39 | 0x3f..=0x42 | 0x47..=0x4a => -2,
        // array stores
        0x50 | 0x52 => -4,
        0x4f | 0x51 | 0x53..=0x56 => -3,
        op::POP => -1,
        op::POP2 => -2,
        op::DUP..=0x5b => 1,
        0x5c..=0x5e => 2,
        op::SWAP => 0,
        // add, sub, mul, div, rem in int, long, float, double order
        0x60..=0x73 => {
            if (insn.opcode - op::IADD) % 2 == 0 {
                -1
            } else {
                -2
            }
        }
        0x74..=0x77 => 0,
        // shifts take an int count
        0x78..=0x7d => -1,
        0x7e | 0x80 | 0x82 => -1,
        0x7f | 0x81 | 0x83 => -2,
        op::IINC => 0,
        0x85 | 0x87 | 0x8c | 0x8d => 1,
        0x86 | 0x8a | 0x8b | 0x8f | 0x91..=0x93 => 0,
        0x88 | 0x89 | 0x8e | 0x90 => -1,
        0x94 | 0x97 | 0x98 => -3,
        0x95 | 0x96 => -1,
        0x99..=0x9e | op::IFNULL | op::IFNONNULL => -1,
        0x9f..=0xa6 => -2,
        op::GOTO | op::GOTO_W | op::JSR | op::JSR_W | RET => 0,
        op::TABLESWITCH | op::LOOKUPSWITCH => -1,
        0xac | 0xae | 0xb0 => -1,
        0xad | 0xaf => -2,
        op::RETURN => 0,
        op::GETSTATIC => field_slots(pool, index())?,
        op::PUTSTATIC => -field_slots(pool, index())?,
        0xb4 => field_slots(pool, index())? - 1,
        0xb5 => -field_slots(pool, index())? - 1,
        op::INVOKEVIRTUAL | op::INVOKESPECIAL | 0xb9 => invoke_delta(pool, index())? - 1,
        op::INVOKESTATIC | 0xba => invoke_delta(pool, index())?,
        op::NEW => 1,
        0xbc..=0xbe => 0,
        op::ATHROW => -1,
        0xc0 | 0xc1 => 0,
        0xc2 | 0xc3 => -1,
        op::WIDE => match code[at + 1] {
            0x15 | 0x17 | 0x19 => 1,
            0x16 | 0x18 => 2,
            0x36 | 0x38 | 0x3a => -1,
            0x37 | 0x39 => -2,
            _ => 0,
        },
        0xc5 => 1 - i32::from(code[at + 3]),
        opcode => {
            return Err(ClassFormatError::InvalidOpcode {
                opcode,
                offset: insn.offset,
            })
        }
    };
    Ok(delta)
}

fn field_slots(pool: &ConstantPool, index: u16) -> Result<i32, ClassFormatError> {
    let descriptor = pool.member_descriptor(index)?;
    Ok(i32::from(FieldType::parse(&descriptor)?.slot_size()))
}

/// Return slots minus argument slots, receiver excluded
fn invoke_delta(pool: &ConstantPool, index: u16) -> Result<i32, ClassFormatError> {
    let descriptor = MethodDescriptor::parse(&pool.member_descriptor(index)?)?;
    let returned = descriptor
        .return_type
        .as_ref()
        .map_or(0, |ty| i32::from(ty.slot_size()));
    Ok(returned - i32::from(descriptor.parameter_slots()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::classfile::domain::ExceptionEntry;
    use crate::features::classfile::infrastructure::opcodes::decode_instructions;

    fn check(bytes: &[u8], pool: &ConstantPool) -> Option<u32> {
        let code = CodeAttribute {
            max_stack: 4,
            max_locals: 1,
            code: bytes.to_vec(),
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        let instructions = decode_instructions(bytes).unwrap();
        loaded_return(&code, &instructions, pool).unwrap()
    }

    #[test]
    fn test_balanced_code_returns_on_empty_stack() {
        let mut pool = ConstantPool::default();
        let init = pool.add_methodref("java/lang/Object", "<init>", "()V").unwrap();
        let [hi, lo] = init.to_be_bytes();
        // aload_0; invokespecial; lconst_1; pop2; iconst_1; pop; return
        let code = [
            op::ALOAD_0,
            op::INVOKESPECIAL,
            hi,
            lo,
            0x0a,
            op::POP2,
            op::ICONST_1,
            op::POP,
            op::RETURN,
        ];
        assert_eq!(check(&code, &pool), None);
    }

    #[test]
    fn test_value_left_before_return_is_found() {
        let pool = ConstantPool::default();
        // iconst_0; ifeq +5 (to 6); iconst_1; return; 6: return
        let code = [
            op::ICONST_0,
            op::IFEQ,
            0x00,
            0x05,
            op::ICONST_1,
            op::RETURN,
            op::RETURN,
        ];
        assert_eq!(check(&code, &pool), Some(5));
    }

    #[test]
    fn test_call_results_are_counted() {
        let mut pool = ConstantPool::default();
        let call = pool.add_methodref("a/B", "size", "(JI)J").unwrap();
        let [hi, lo] = call.to_be_bytes();
        // lconst_0; iconst_0; invokestatic (JI)J; return
        let code = [0x09, op::ICONST_0, op::INVOKESTATIC, hi, lo, op::RETURN];
        assert_eq!(check(&code, &pool), Some(5));
    }

    #[test]
    fn test_handlers_start_with_the_exception() {
        let pool = ConstantPool::default();
        // 0: iconst_1; 1: pop; 2: return; 3: pop; 4: return
        let bytes = [op::ICONST_1, op::POP, op::RETURN, op::POP, op::RETURN];
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: bytes.to_vec(),
            exception_table: vec![ExceptionEntry {
                start_pc: 0,
                end_pc: 2,
                handler_pc: 3,
                catch_type: 0,
            }],
            attributes: Vec::new(),
        };
        let instructions = decode_instructions(&bytes).unwrap();
        assert_eq!(loaded_return(&code, &instructions, &pool).unwrap(), None);
    }

    #[test]
    fn test_underflow_is_rejected() {
        let pool = ConstantPool::default();
        let bytes = [op::POP, op::RETURN];
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: bytes.to_vec(),
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        let instructions = decode_instructions(&bytes).unwrap();
        assert!(loaded_return(&code, &instructions, &pool).is_err());
    }
}
