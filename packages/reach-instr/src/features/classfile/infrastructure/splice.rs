//! Splicing a generated block into an existing `Code` attribute

use std::collections::BTreeMap;

use tracing::debug;

use super::opcodes::{decode_instructions, op};
use super::operand_stack::loaded_return;
use super::relocation::{
    emit, relocate, remap_exception_table, remap_frame, remap_line_numbers,
    remap_local_variables,
};
use super::stack_map::{decode_frames, encode_frames, StackMapFrame, VerificationType};
use crate::features::classfile::domain::{
    AttributeInfo, ClassFormatError, CodeAttribute, ConstantPool, ExceptionEntry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Prepend; the original body starts where the block falls through
    Before,
    /// Every `return` jumps to an epilogue of block + `return`; each one
    /// must leave the operand stack empty
    After,
}

/// Self-contained code produced by the generator.
///
/// Offsets in `exception_table` and `frames` are relative to the block
/// start. Falling off the end of `code` continues at the join point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceBlock {
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub frames: Vec<StackMapFrame>,
    pub max_stack: u16,
    /// Locals at block entry and at the join point
    pub locals: Vec<VerificationType>,
}

#[derive(Debug, Clone)]
pub struct SpliceRequest {
    pub placement: Placement,
    pub block: SpliceBlock,
    /// Locals at method entry, needed to expand the existing StackMapTable
    pub entry_locals: Vec<VerificationType>,
    /// Create a StackMapTable when the method has none
    pub emit_frames: bool,
}

pub fn splice(
    original: &CodeAttribute,
    pool: &mut ConstantPool,
    request: &SpliceRequest,
) -> Result<CodeAttribute, ClassFormatError> {
    let block = &request.block;
    let block_len = block.code.len() as u32;
    let instructions = decode_instructions(&original.code)?;
    if request.placement == Placement::After {
        if let Some(at) = loaded_return(original, &instructions, pool)? {
            return Err(ClassFormatError::ReturnWithOperands(at));
        }
    }

    let (base, redirect_returns) = match request.placement {
        Placement::Before => (block_len, false),
        Placement::After => (0, true),
    };
    let (map, relocated_end) = relocate(&original.code, &instructions, base, redirect_returns)?;
    let block_start = match request.placement {
        Placement::Before => 0,
        Placement::After => relocated_end,
    };
    let relocated = emit(
        &original.code,
        &instructions,
        map,
        redirect_returns.then_some(block_start),
    )?;
    let map = &relocated.map;

    let mut code = Vec::with_capacity(relocated.code.len() + block.code.len() + 1);
    match request.placement {
        Placement::Before => {
            code.extend_from_slice(&block.code);
            code.extend_from_slice(&relocated.code);
        }
        Placement::After => {
            code.extend_from_slice(&relocated.code);
            code.extend_from_slice(&block.code);
            code.push(op::RETURN);
        }
    }
    if code.len() > u16::MAX as usize {
        return Err(ClassFormatError::CodeTooLarge(code.len()));
    }

    let shifted: Vec<ExceptionEntry> = block
        .exception_table
        .iter()
        .map(|entry| ExceptionEntry {
            start_pc: (block_start + entry.start_pc as u32) as u16,
            end_pc: (block_start + entry.end_pc as u32) as u16,
            handler_pc: (block_start + entry.handler_pc as u32) as u16,
            catch_type: entry.catch_type,
        })
        .collect();
    let remapped = remap_exception_table(&original.exception_table, map)?;
    let exception_table = match request.placement {
        Placement::Before => [shifted, remapped].concat(),
        Placement::After => [remapped, shifted].concat(),
    };

    // Generated frames first; an original frame at the same offset wins
    let mut frames: BTreeMap<u32, StackMapFrame> = BTreeMap::new();
    let mut generated = |offset: u32, locals: &[VerificationType], stack: &[VerificationType]| {
        frames.insert(
            offset,
            StackMapFrame {
                offset,
                locals: locals.to_vec(),
                stack: stack.to_vec(),
            },
        );
    };
    if request.placement == Placement::After {
        generated(block_start, &block.locals, &[]);
    }
    for frame in &block.frames {
        generated(block_start + frame.offset, &frame.locals, &frame.stack);
    }
    generated(block_start + block_len, &block.locals, &[]);

    let mut attributes = Vec::with_capacity(original.attributes.len() + 1);
    let mut stack_map_slot = None;
    for attribute in &original.attributes {
        let name = attribute.name(pool)?;
        let info = match name.as_str() {
            "StackMapTable" => {
                for frame in decode_frames(&attribute.info, &request.entry_locals)? {
                    let frame = remap_frame(&frame, map)?;
                    frames.insert(frame.offset, frame);
                }
                stack_map_slot = Some(attributes.len());
                Vec::new()
            }
            "LineNumberTable" => remap_line_numbers(&attribute.info, map)?,
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                remap_local_variables(&attribute.info, map)?
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                debug!(attribute = %name, "dropping code type annotations on rewrite");
                continue;
            }
            _ => attribute.info.clone(),
        };
        attributes.push(AttributeInfo {
            name_index: attribute.name_index,
            info,
        });
    }

    let frames: Vec<StackMapFrame> = frames.into_values().collect();
    match stack_map_slot {
        Some(slot) => attributes[slot].info = encode_frames(&frames)?,
        None if request.emit_frames => attributes.push(AttributeInfo {
            name_index: pool.add_utf8("StackMapTable")?,
            info: encode_frames(&frames)?,
        }),
        None => {}
    }

    Ok(CodeAttribute {
        max_stack: original.max_stack.max(block.max_stack),
        max_locals: original.max_locals,
        code,
        exception_table,
        attributes,
    })
}
