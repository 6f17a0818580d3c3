//! Big-endian cursor over class-file bytes

use byteorder::{BigEndian, ByteOrder};

use crate::features::classfile::domain::ClassFormatError;

pub(crate) struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn expect_magic(&mut self) -> Result<(), ClassFormatError> {
        const MAGIC: u32 = 0xCAFEBABE;
        let magic = self.read_u4()?;
        if magic != MAGIC {
            return Err(ClassFormatError::InvalidMagic(magic));
        }
        Ok(())
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8, ClassFormatError> {
        let slice = self.read_slice(1)?;
        Ok(slice[0])
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16, ClassFormatError> {
        let slice = self.read_slice(2)?;
        Ok(BigEndian::read_u16(slice))
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32, ClassFormatError> {
        let slice = self.read_slice(4)?;
        Ok(BigEndian::read_u32(slice))
    }

    pub(crate) fn read_i4(&mut self) -> Result<i32, ClassFormatError> {
        let slice = self.read_slice(4)?;
        Ok(BigEndian::read_i32(slice))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u64, ClassFormatError> {
        let slice = self.read_slice(8)?;
        Ok(BigEndian::read_u64(slice))
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        if self.pos + len > self.data.len() {
            return Err(ClassFormatError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}
