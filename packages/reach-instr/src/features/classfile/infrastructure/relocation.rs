//! Code relocation
//!
//! Lays the original instructions out at new offsets, rewrites relative
//! branch and switch operands, and remaps every offset-bearing table.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::opcodes::{op, switch_padding, Instruction};
use super::reader::ClassReader;
use super::stack_map::{StackMapFrame, VerificationType};
use crate::features::classfile::domain::{ClassFormatError, ExceptionEntry};

const NOT_A_BOUNDARY: u32 = u32::MAX;

/// Old offset to new offset, defined on instruction boundaries and code end
pub(crate) struct OffsetMap {
    table: Vec<u32>,
}

impl OffsetMap {
    pub(crate) fn get(&self, old: u32) -> Result<u32, ClassFormatError> {
        match self.table.get(old as usize) {
            Some(&new) if new != NOT_A_BOUNDARY => Ok(new),
            _ => Err(ClassFormatError::NotAnInstructionBoundary(old)),
        }
    }

    fn get_u16(&self, old: u16) -> Result<u16, ClassFormatError> {
        let new = self.get(old as u32)?;
        u16::try_from(new).map_err(|_| ClassFormatError::CodeTooLarge(new as usize))
    }
}

/// Relocated copy of one code array
pub(crate) struct Relocated {
    pub(crate) code: Vec<u8>,
    pub(crate) map: OffsetMap,
}

/// Lays `code` out from `base`; returns the offset map and the new end.
/// With `redirect_returns`, each `return` is sized as a `goto_w`.
pub(crate) fn relocate(
    code: &[u8],
    instructions: &[Instruction],
    base: u32,
    redirect_returns: bool,
) -> Result<(OffsetMap, u32), ClassFormatError> {
    let mut table = vec![NOT_A_BOUNDARY; code.len() + 1];
    let mut next = base;
    for insn in instructions {
        table[insn.offset as usize] = next;
        let length = if insn.is_switch() {
            let operands = insn.length - 1 - switch_padding(insn.offset);
            1 + switch_padding(next) + operands
        } else if redirect_returns && insn.opcode == op::RETURN {
            5
        } else {
            insn.length
        };
        next += length;
    }
    table[code.len()] = next;
    Ok((OffsetMap { table }, next))
}

pub(crate) fn emit(
    code: &[u8],
    instructions: &[Instruction],
    map: OffsetMap,
    return_target: Option<u32>,
) -> Result<Relocated, ClassFormatError> {
    let mut out = Vec::with_capacity(code.len() + 16);
    for insn in instructions {
        let old = insn.offset;
        let new = map.get(old)?;
        let start = old as usize;
        let bytes = &code[start..start + insn.length as usize];

        if insn.has_branch16() {
            let target = branch_target(old, BigEndian::read_i16(&bytes[1..3]) as i32);
            let relative = relative_offset(&map, old, new, target)?;
            let relative = i16::try_from(relative)
                .map_err(|_| ClassFormatError::BranchOverflow { at: old, target })?;
            out.write_u8(insn.opcode)?;
            out.write_i16::<BigEndian>(relative)?;
        } else if insn.has_branch32() {
            let target = branch_target(old, BigEndian::read_i32(&bytes[1..5]));
            let relative = relative_offset(&map, old, new, target)?;
            out.write_u8(insn.opcode)?;
            out.write_i32::<BigEndian>(relative)?;
        } else if insn.is_switch() {
            emit_switch(&mut out, bytes, insn, new, &map)?;
        } else if let (Some(target), op::RETURN) = (return_target, insn.opcode) {
            out.write_u8(op::GOTO_W)?;
            out.write_i32::<BigEndian>(target as i32 - new as i32)?;
        } else {
            out.extend_from_slice(bytes);
        }
    }
    Ok(Relocated { code: out, map })
}

fn branch_target(at: u32, relative: i32) -> u32 {
    (at as i64 + relative as i64) as u32
}

fn relative_offset(
    map: &OffsetMap,
    at: u32,
    new_at: u32,
    target: u32,
) -> Result<i32, ClassFormatError> {
    let new_target = map.get(target)?;
    i32::try_from(new_target as i64 - new_at as i64)
        .map_err(|_| ClassFormatError::BranchOverflow { at, target })
}

fn emit_switch(
    out: &mut Vec<u8>,
    bytes: &[u8],
    insn: &Instruction,
    new: u32,
    map: &OffsetMap,
) -> Result<(), ClassFormatError> {
    let old = insn.offset;
    let operands = &bytes[1 + switch_padding(old) as usize..];
    let read = |i: usize| BigEndian::read_i32(&operands[i * 4..i * 4 + 4]);

    out.write_u8(insn.opcode)?;
    for _ in 0..switch_padding(new) {
        out.write_u8(0)?;
    }

    let default = branch_target(old, read(0));
    out.write_i32::<BigEndian>(relative_offset(map, old, new, default)?)?;

    if insn.opcode == op::TABLESWITCH {
        let low = read(1);
        let high = read(2);
        out.write_i32::<BigEndian>(low)?;
        out.write_i32::<BigEndian>(high)?;
        let entries = (high as i64 - low as i64 + 1) as usize;
        for i in 0..entries {
            let target = branch_target(old, read(3 + i));
            out.write_i32::<BigEndian>(relative_offset(map, old, new, target)?)?;
        }
    } else {
        let npairs = read(1) as usize;
        out.write_i32::<BigEndian>(npairs as i32)?;
        for i in 0..npairs {
            out.write_i32::<BigEndian>(read(2 + i * 2))?;
            let target = branch_target(old, read(3 + i * 2));
            out.write_i32::<BigEndian>(relative_offset(map, old, new, target)?)?;
        }
    }
    Ok(())
}

pub(crate) fn remap_exception_table(
    table: &[ExceptionEntry],
    map: &OffsetMap,
) -> Result<Vec<ExceptionEntry>, ClassFormatError> {
    table
        .iter()
        .map(|entry| {
            Ok(ExceptionEntry {
                start_pc: map.get_u16(entry.start_pc)?,
                end_pc: map.get_u16(entry.end_pc)?,
                handler_pc: map.get_u16(entry.handler_pc)?,
                catch_type: entry.catch_type,
            })
        })
        .collect()
}

pub(crate) fn remap_line_numbers(data: &[u8], map: &OffsetMap) -> Result<Vec<u8>, ClassFormatError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u2()?;
    let mut out = Vec::with_capacity(data.len());
    out.write_u16::<BigEndian>(count)?;
    for _ in 0..count {
        let start_pc = reader.read_u2()?;
        let line = reader.read_u2()?;
        out.write_u16::<BigEndian>(map.get_u16(start_pc)?)?;
        out.write_u16::<BigEndian>(line)?;
    }
    Ok(out)
}

/// Shared by LocalVariableTable and LocalVariableTypeTable
pub(crate) fn remap_local_variables(
    data: &[u8],
    map: &OffsetMap,
) -> Result<Vec<u8>, ClassFormatError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u2()?;
    let mut out = Vec::with_capacity(data.len());
    out.write_u16::<BigEndian>(count)?;
    for _ in 0..count {
        let start_pc = reader.read_u2()?;
        let length = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let descriptor_index = reader.read_u2()?;
        let index = reader.read_u2()?;

        let new_start = map.get_u16(start_pc)?;
        let new_end = map.get_u16(start_pc.saturating_add(length))?;
        out.write_u16::<BigEndian>(new_start)?;
        out.write_u16::<BigEndian>(new_end.saturating_sub(new_start))?;
        out.write_u16::<BigEndian>(name_index)?;
        out.write_u16::<BigEndian>(descriptor_index)?;
        out.write_u16::<BigEndian>(index)?;
    }
    Ok(out)
}

pub(crate) fn remap_frame(
    frame: &StackMapFrame,
    map: &OffsetMap,
) -> Result<StackMapFrame, ClassFormatError> {
    let remap_types = |types: &[VerificationType]| -> Result<Vec<VerificationType>, ClassFormatError> {
        types
            .iter()
            .map(|ty| match ty {
                VerificationType::Uninitialized(offset) => {
                    Ok(VerificationType::Uninitialized(map.get_u16(*offset)?))
                }
                other => Ok(other.clone()),
            })
            .collect()
    };
    Ok(StackMapFrame {
        offset: map.get(frame.offset)?,
        locals: remap_types(&frame.locals)?,
        stack: remap_types(&frame.stack)?,
    })
}
