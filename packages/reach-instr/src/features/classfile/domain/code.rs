use byteorder::{BigEndian, WriteBytesExt};

use super::{AttributeInfo, ClassFormatError};
use crate::features::classfile::infrastructure::reader::ClassReader;

/// `exception_table` entry; `catch_type` 0 catches everything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Decoded `Code` attribute body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn parse(info: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ClassReader::new(info);
        let max_stack = reader.read_u2()?;
        let max_locals = reader.read_u2()?;
        let code_length = reader.read_u4()? as usize;
        let code = reader.read_slice(code_length)?.to_vec();

        let table_length = reader.read_u2()?;
        let mut exception_table = Vec::with_capacity(table_length as usize);
        for _ in 0..table_length {
            exception_table.push(ExceptionEntry {
                start_pc: reader.read_u2()?,
                end_pc: reader.read_u2()?,
                handler_pc: reader.read_u2()?,
                catch_type: reader.read_u2()?,
            });
        }

        let attributes = AttributeInfo::parse_all(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(ClassFormatError::attribute(
                "Code",
                format!("{} trailing bytes", reader.remaining()),
            ));
        }

        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFormatError> {
        if self.code.len() > u16::MAX as usize {
            return Err(ClassFormatError::CodeTooLarge(self.code.len()));
        }

        let mut out = Vec::with_capacity(self.code.len() + 32);
        out.write_u16::<BigEndian>(self.max_stack)?;
        out.write_u16::<BigEndian>(self.max_locals)?;
        out.write_u32::<BigEndian>(self.code.len() as u32)?;
        out.extend_from_slice(&self.code);
        out.write_u16::<BigEndian>(self.exception_table.len() as u16)?;
        for entry in &self.exception_table {
            out.write_u16::<BigEndian>(entry.start_pc)?;
            out.write_u16::<BigEndian>(entry.end_pc)?;
            out.write_u16::<BigEndian>(entry.handler_pc)?;
            out.write_u16::<BigEndian>(entry.catch_type)?;
        }
        AttributeInfo::write_all(&self.attributes, &mut out)?;
        Ok(out)
    }
}
