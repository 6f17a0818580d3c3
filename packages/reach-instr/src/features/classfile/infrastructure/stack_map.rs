//! StackMapTable codec
//!
//! Frames are handled in absolute form (offset plus complete locals and
//! stack). Decoding expands every compressed frame kind; encoding always
//! writes `full_frame`.

use byteorder::{BigEndian, WriteBytesExt};

use super::reader::ClassReader;
use crate::features::classfile::domain::{
    ClassFormatError, ConstantPool, FieldType, MethodDescriptor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Constant-pool index of a `CONSTANT_Class`
    Object(u16),
    /// Offset of the `new` instruction that created the value
    Uninitialized(u16),
}

impl VerificationType {
    fn read(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        let tag = reader.read_u1()?;
        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(reader.read_u2()?),
            8 => VerificationType::Uninitialized(reader.read_u2()?),
            other => return Err(ClassFormatError::InvalidVerificationType(other)),
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFormatError> {
        match self {
            VerificationType::Top => out.write_u8(0)?,
            VerificationType::Integer => out.write_u8(1)?,
            VerificationType::Float => out.write_u8(2)?,
            VerificationType::Double => out.write_u8(3)?,
            VerificationType::Long => out.write_u8(4)?,
            VerificationType::Null => out.write_u8(5)?,
            VerificationType::UninitializedThis => out.write_u8(6)?,
            VerificationType::Object(index) => {
                out.write_u8(7)?;
                out.write_u16::<BigEndian>(*index)?;
            }
            VerificationType::Uninitialized(offset) => {
                out.write_u8(8)?;
                out.write_u16::<BigEndian>(*offset)?;
            }
        }
        Ok(())
    }

    pub fn of_field_type(
        ty: &FieldType,
        pool: &mut ConstantPool,
    ) -> Result<Self, ClassFormatError> {
        Ok(match ty {
            FieldType::Byte
            | FieldType::Char
            | FieldType::Short
            | FieldType::Boolean
            | FieldType::Int => VerificationType::Integer,
            FieldType::Float => VerificationType::Float,
            FieldType::Long => VerificationType::Long,
            FieldType::Double => VerificationType::Double,
            FieldType::Object(internal) => VerificationType::Object(pool.add_class(internal)?),
            // Array classes are named by their descriptor
            FieldType::Array(_) => VerificationType::Object(pool.add_class(&ty.to_string())?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub offset: u32,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

/// Locals at method entry: `this` (uninitialized inside `<init>`) then parameters
pub fn initial_locals(
    pool: &mut ConstantPool,
    this_class: u16,
    is_static: bool,
    is_constructor: bool,
    descriptor: &MethodDescriptor,
) -> Result<Vec<VerificationType>, ClassFormatError> {
    let mut locals = Vec::with_capacity(descriptor.parameters.len() + 1);
    if !is_static {
        locals.push(if is_constructor {
            VerificationType::UninitializedThis
        } else {
            VerificationType::Object(this_class)
        });
    }
    for parameter in &descriptor.parameters {
        locals.push(VerificationType::of_field_type(parameter, pool)?);
    }
    Ok(locals)
}

pub fn decode_frames(
    data: &[u8],
    initial_locals: &[VerificationType],
) -> Result<Vec<StackMapFrame>, ClassFormatError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u2()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut locals = initial_locals.to_vec();
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let frame_type = reader.read_u1()?;
        let (delta, stack) = match frame_type {
            0..=63 => (frame_type as u16, Vec::new()),
            64..=127 => (
                (frame_type - 64) as u16,
                vec![VerificationType::read(&mut reader)?],
            ),
            247 => {
                let delta = reader.read_u2()?;
                (delta, vec![VerificationType::read(&mut reader)?])
            }
            248..=250 => {
                let delta = reader.read_u2()?;
                let chop = (251 - frame_type) as usize;
                if chop > locals.len() {
                    return Err(ClassFormatError::attribute(
                        "StackMapTable",
                        "chop_frame removes more locals than present",
                    ));
                }
                locals.truncate(locals.len() - chop);
                (delta, Vec::new())
            }
            251 => (reader.read_u2()?, Vec::new()),
            252..=254 => {
                let delta = reader.read_u2()?;
                for _ in 0..(frame_type - 251) {
                    locals.push(VerificationType::read(&mut reader)?);
                }
                (delta, Vec::new())
            }
            255 => {
                let delta = reader.read_u2()?;
                let locals_count = reader.read_u2()?;
                locals = (0..locals_count)
                    .map(|_| VerificationType::read(&mut reader))
                    .collect::<Result<_, _>>()?;
                let stack_count = reader.read_u2()?;
                let stack = (0..stack_count)
                    .map(|_| VerificationType::read(&mut reader))
                    .collect::<Result<_, _>>()?;
                (delta, stack)
            }
            reserved => return Err(ClassFormatError::InvalidFrameType(reserved)),
        };

        let offset = match previous {
            None => delta as u32,
            Some(prev) => prev + delta as u32 + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame {
            offset,
            locals: locals.clone(),
            stack,
        });
    }

    if reader.remaining() != 0 {
        return Err(ClassFormatError::attribute(
            "StackMapTable",
            format!("{} trailing bytes", reader.remaining()),
        ));
    }
    Ok(frames)
}

/// Frames must be sorted by offset with no duplicates
pub fn encode_frames(frames: &[StackMapFrame]) -> Result<Vec<u8>, ClassFormatError> {
    let mut out = Vec::new();
    out.write_u16::<BigEndian>(frames.len() as u16)?;
    let mut previous: Option<u32> = None;
    for frame in frames {
        let delta = match previous {
            None => frame.offset,
            Some(prev) if frame.offset > prev => frame.offset - prev - 1,
            Some(_) => {
                return Err(ClassFormatError::attribute(
                    "StackMapTable",
                    format!("frame at {} is out of order", frame.offset),
                ))
            }
        };
        previous = Some(frame.offset);

        out.write_u8(255)?;
        out.write_u16::<BigEndian>(delta as u16)?;
        out.write_u16::<BigEndian>(frame.locals.len() as u16)?;
        for local in &frame.locals {
            local.write(&mut out)?;
        }
        out.write_u16::<BigEndian>(frame.stack.len() as u16)?;
        for item in &frame.stack {
            item.write(&mut out)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_compressed_frames() {
        let initial = vec![VerificationType::Object(2), VerificationType::Integer];
        let data = vec![
            0, 4,  // four frames
            5,     // same_frame, offset 5
            64 + 2, 1, // same_locals_1_stack_item, offset 8, [int]
            253, 0, 3, 1, 4, // append_frame +2, offset 12
            249, 0, 0, // chop_frame -2, offset 13
        ];
        let frames = decode_frames(&data, &initial).unwrap();
        let offsets: Vec<u32> = frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![5, 8, 12, 13]);
        assert_eq!(frames[1].stack, vec![VerificationType::Integer]);
        assert_eq!(frames[2].locals.len(), 4);
        assert_eq!(frames[2].locals[3], VerificationType::Long);
        assert_eq!(frames[3].locals, initial);
    }

    #[test]
    fn test_full_frames_round_trip() {
        let frames = vec![
            StackMapFrame {
                offset: 3,
                locals: vec![VerificationType::UninitializedThis],
                stack: vec![VerificationType::Uninitialized(0)],
            },
            StackMapFrame {
                offset: 10,
                locals: vec![VerificationType::Object(4)],
                stack: Vec::new(),
            },
        ];
        let bytes = encode_frames(&frames).unwrap();
        assert_eq!(decode_frames(&bytes, &[]).unwrap(), frames);
    }

    #[test]
    fn test_rejects_reserved_type() {
        assert!(matches!(
            decode_frames(&[0, 1, 200], &[]),
            Err(ClassFormatError::InvalidFrameType(200))
        ));
    }

    #[test]
    fn test_initial_locals_for_constructor() {
        let mut pool = ConstantPool::default();
        let this_class = pool.add_class("a/B").unwrap();
        let desc = MethodDescriptor::parse("(J[I)V").unwrap();
        let locals = initial_locals(&mut pool, this_class, false, true, &desc).unwrap();
        assert_eq!(locals[0], VerificationType::UninitializedThis);
        assert_eq!(locals[1], VerificationType::Long);
        assert!(matches!(locals[2], VerificationType::Object(_)));
    }
}
