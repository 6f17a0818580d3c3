use byteorder::{BigEndian, WriteBytesExt};

use super::{ClassFormatError, CodeAttribute, ConstantPool};
use crate::features::classfile::infrastructure::reader::ClassReader;
use crate::shared::constants::access::{
    ACC_ANNOTATION, ACC_ENUM, ACC_INTERFACE, ACC_NATIVE, ACC_STATIC,
};

/// Raw attribute: name plus uninterpreted payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub(crate) fn parse_all(
        reader: &mut ClassReader<'_>,
    ) -> Result<Vec<AttributeInfo>, ClassFormatError> {
        let count = reader.read_u2()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_index = reader.read_u2()?;
            let length = reader.read_u4()? as usize;
            attributes.push(AttributeInfo {
                name_index,
                info: reader.read_slice(length)?.to_vec(),
            });
        }
        Ok(attributes)
    }

    pub(crate) fn write_all(
        attributes: &[AttributeInfo],
        out: &mut Vec<u8>,
    ) -> Result<(), ClassFormatError> {
        out.write_u16::<BigEndian>(attributes.len() as u16)?;
        for attribute in attributes {
            out.write_u16::<BigEndian>(attribute.name_index)?;
            out.write_u32::<BigEndian>(attribute.info.len() as u32)?;
            out.extend_from_slice(&attribute.info);
        }
        Ok(())
    }

    pub fn find<'a>(
        attributes: &'a [AttributeInfo],
        pool: &ConstantPool,
        name: &str,
    ) -> Option<&'a AttributeInfo> {
        attributes
            .iter()
            .find(|attribute| pool.utf8_equals(attribute.name_index, name))
    }

    pub fn name(&self, pool: &ConstantPool) -> Result<String, ClassFormatError> {
        pool.utf8(self.name_index)
    }
}

/// `field_info` / `method_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        Ok(Self {
            access_flags: reader.read_u2()?,
            name_index: reader.read_u2()?,
            descriptor_index: reader.read_u2()?,
            attributes: AttributeInfo::parse_all(reader)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFormatError> {
        out.write_u16::<BigEndian>(self.access_flags)?;
        out.write_u16::<BigEndian>(self.name_index)?;
        out.write_u16::<BigEndian>(self.descriptor_index)?;
        AttributeInfo::write_all(&self.attributes, out)
    }

    pub fn name(&self, pool: &ConstantPool) -> Result<String, ClassFormatError> {
        pool.utf8(self.name_index)
    }

    pub fn descriptor(&self, pool: &ConstantPool) -> Result<String, ClassFormatError> {
        pool.utf8(self.descriptor_index)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    pub fn code(&self, pool: &ConstantPool) -> Result<Option<CodeAttribute>, ClassFormatError> {
        AttributeInfo::find(&self.attributes, pool, "Code")
            .map(|attribute| CodeAttribute::parse(&attribute.info))
            .transpose()
    }

    /// Replaces the existing `Code` attribute in place, or appends one
    pub fn set_code(
        &mut self,
        pool: &mut ConstantPool,
        code: &CodeAttribute,
    ) -> Result<(), ClassFormatError> {
        let info = code.to_bytes()?;
        let slot = self
            .attributes
            .iter()
            .position(|attribute| pool.utf8_equals(attribute.name_index, "Code"));
        match slot {
            Some(i) => self.attributes[i].info = info,
            None => {
                let name_index = pool.add_utf8("Code")?;
                self.attributes.push(AttributeInfo { name_index, info });
            }
        }
        Ok(())
    }
}

/// Relationship of a type to its enclosing type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nesting {
    TopLevel,
    Nested {
        /// Internal name of the enclosing type, if recorded
        enclosing: Option<String>,
        is_static: bool,
    },
}

impl Nesting {
    pub fn is_nested(&self) -> bool {
        matches!(self, Nesting::Nested { .. })
    }

    /// Top-level types count as static
    pub fn is_static(&self) -> bool {
        match self {
            Nesting::TopLevel => true,
            Nesting::Nested { is_static, .. } => *is_static,
        }
    }
}

/// One compiled type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ClassReader::new(bytes);
        reader.expect_magic()?;
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;

        let interfaces_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(reader.read_u2()?);
        }

        let fields_count = reader.read_u2()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            fields.push(MemberInfo::parse(&mut reader)?);
        }

        let methods_count = reader.read_u2()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(MemberInfo::parse(&mut reader)?);
        }

        let attributes = AttributeInfo::parse_all(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(ClassFormatError::TrailingBytes(reader.remaining()));
        }

        let class = Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        // Fail early on a broken this_class entry
        class.this_class_name()?;
        Ok(class)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFormatError> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xCAFEBABE)?;
        out.write_u16::<BigEndian>(self.minor_version)?;
        out.write_u16::<BigEndian>(self.major_version)?;
        self.constant_pool.write(&mut out)?;
        out.write_u16::<BigEndian>(self.access_flags)?;
        out.write_u16::<BigEndian>(self.this_class)?;
        out.write_u16::<BigEndian>(self.super_class)?;
        out.write_u16::<BigEndian>(self.interfaces.len() as u16)?;
        for interface in &self.interfaces {
            out.write_u16::<BigEndian>(*interface)?;
        }
        out.write_u16::<BigEndian>(self.fields.len() as u16)?;
        for field in &self.fields {
            field.write(&mut out)?;
        }
        out.write_u16::<BigEndian>(self.methods.len() as u16)?;
        for method in &self.methods {
            method.write(&mut out)?;
        }
        AttributeInfo::write_all(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Internal name, e.g. `a/b/Outer$Inner`
    pub fn this_class_name(&self) -> Result<String, ClassFormatError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Dotted name, e.g. `a.b.Outer$Inner`
    pub fn qualified_name(&self) -> Result<String, ClassFormatError> {
        Ok(self.this_class_name()?.replace('/', "."))
    }

    pub fn super_class_name(&self) -> Result<Option<String>, ClassFormatError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & (ACC_INTERFACE | ACC_ANNOTATION) != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access_flags & ACC_ENUM != 0
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|field| self.constant_pool.utf8_equals(field.name_index, name))
    }

    pub fn add_field(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<AttributeInfo>,
    ) -> Result<(), ClassFormatError> {
        let name_index = self.constant_pool.add_utf8(name)?;
        let descriptor_index = self.constant_pool.add_utf8(descriptor)?;
        self.fields.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        AttributeInfo::find(&self.attributes, &self.constant_pool, name)
    }

    /// Reads `InnerClasses` (and `EnclosingMethod` as fallback) for this type
    pub fn nesting(&self) -> Result<Nesting, ClassFormatError> {
        let Some(inner_classes) = self.attribute("InnerClasses") else {
            return Ok(Nesting::TopLevel);
        };

        let own_name = self.this_class_name()?;
        let mut reader = ClassReader::new(&inner_classes.info);
        let count = reader.read_u2()?;
        for _ in 0..count {
            let inner_class_info = reader.read_u2()?;
            let outer_class_info = reader.read_u2()?;
            let _inner_name = reader.read_u2()?;
            let inner_flags = reader.read_u2()?;

            if inner_class_info == 0
                || self.constant_pool.class_name(inner_class_info)? != own_name
            {
                continue;
            }

            let enclosing = if outer_class_info != 0 {
                Some(self.constant_pool.class_name(outer_class_info)?)
            } else {
                self.enclosing_method_class()?
            };
            return Ok(Nesting::Nested {
                enclosing,
                is_static: inner_flags & ACC_STATIC != 0,
            });
        }

        Ok(Nesting::TopLevel)
    }

    fn enclosing_method_class(&self) -> Result<Option<String>, ClassFormatError> {
        let Some(attribute) = self.attribute("EnclosingMethod") else {
            return Ok(None);
        };
        let mut reader = ClassReader::new(&attribute.info);
        let class_index = reader.read_u2()?;
        if class_index == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(class_index).map(Some)
    }
}
