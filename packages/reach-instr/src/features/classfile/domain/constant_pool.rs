use byteorder::{BigEndian, WriteBytesExt};

use super::{mutf8, ClassFormatError};
use crate::features::classfile::infrastructure::reader::ClassReader;

/// One constant-pool entry.
///
/// Float and double values are kept as raw bits so that entries compare
/// and round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    /// Slot 0 and the second slot of long/double entries
    Unusable,
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let constant = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    Constant::Utf8(reader.read_slice(length)?.to_vec())
                }
                3 => Constant::Integer(reader.read_i4()?),
                4 => Constant::Float(reader.read_u4()?),
                5 => Constant::Long(reader.read_u8()? as i64),
                6 => Constant::Double(reader.read_u8()?),
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 => Constant::String {
                    string_index: reader.read_u2()?,
                },
                9 => Constant::Fieldref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                10 => Constant::Methodref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                11 => Constant::InterfaceMethodref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                12 => Constant::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => Constant::MethodHandle {
                    reference_kind: reader.read_u1()?,
                    reference_index: reader.read_u2()?,
                },
                16 => Constant::MethodType {
                    descriptor_index: reader.read_u2()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                19 => Constant::Module {
                    name_index: reader.read_u2()?,
                },
                20 => Constant::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(ClassFormatError::UnsupportedConstant { tag: other }),
            };

            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        if entries.len() != count.max(1) {
            return Err(ClassFormatError::attribute(
                "constant pool",
                "wide entry overruns the declared count",
            ));
        }

        Ok(Self { entries })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFormatError> {
        out.write_u16::<BigEndian>(self.count())?;
        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(bytes) => {
                    if bytes.len() > u16::MAX as usize {
                        return Err(ClassFormatError::attribute(
                            "CONSTANT_Utf8",
                            "string longer than 65535 bytes",
                        ));
                    }
                    out.write_u8(1)?;
                    out.write_u16::<BigEndian>(bytes.len() as u16)?;
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    out.write_u8(3)?;
                    out.write_i32::<BigEndian>(*v)?;
                }
                Constant::Float(bits) => {
                    out.write_u8(4)?;
                    out.write_u32::<BigEndian>(*bits)?;
                }
                Constant::Long(v) => {
                    out.write_u8(5)?;
                    out.write_i64::<BigEndian>(*v)?;
                }
                Constant::Double(bits) => {
                    out.write_u8(6)?;
                    out.write_u64::<BigEndian>(*bits)?;
                }
                Constant::Class { name_index } => {
                    out.write_u8(7)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
                Constant::String { string_index } => {
                    out.write_u8(8)?;
                    out.write_u16::<BigEndian>(*string_index)?;
                }
                Constant::Fieldref {
                    class_index,
                    name_and_type_index,
                } => write_pair(out, 9, *class_index, *name_and_type_index)?,
                Constant::Methodref {
                    class_index,
                    name_and_type_index,
                } => write_pair(out, 10, *class_index, *name_and_type_index)?,
                Constant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => write_pair(out, 11, *class_index, *name_and_type_index)?,
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => write_pair(out, 12, *name_index, *descriptor_index)?,
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    out.write_u8(15)?;
                    out.write_u8(*reference_kind)?;
                    out.write_u16::<BigEndian>(*reference_index)?;
                }
                Constant::MethodType { descriptor_index } => {
                    out.write_u8(16)?;
                    out.write_u16::<BigEndian>(*descriptor_index)?;
                }
                Constant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => write_pair(out, 17, *bootstrap_method_attr_index, *name_and_type_index)?,
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => write_pair(out, 18, *bootstrap_method_attr_index, *name_and_type_index)?,
                Constant::Module { name_index } => {
                    out.write_u8(19)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
                Constant::Package { name_index } => {
                    out.write_u8(20)?;
                    out.write_u16::<BigEndian>(*name_index)?;
                }
            }
        }
        Ok(())
    }

    /// `constant_pool_count` as written in the header
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFormatError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => {
                Err(ClassFormatError::InvalidConstantIndex { index })
            }
            Some(constant) => Ok(constant),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<String, ClassFormatError> {
        match self.get(index)? {
            Constant::Utf8(bytes) => mutf8::decode(bytes),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal (slash separated) name of a `CONSTANT_Class` entry
    pub fn class_name(&self, index: u16) -> Result<String, ClassFormatError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// `(owner, name, descriptor)` of a `CONSTANT_Methodref`
    pub fn method_ref(&self, index: u16) -> Result<(String, String, String), ClassFormatError> {
        let (class_index, name_and_type_index) = match self.get(index)? {
            Constant::Methodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => {
                return Err(ClassFormatError::UnexpectedConstant {
                    index,
                    expected: "Methodref",
                })
            }
        };
        match self.get(name_and_type_index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((
                self.class_name(class_index)?,
                self.utf8(*name_index)?,
                self.utf8(*descriptor_index)?,
            )),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index: name_and_type_index,
                expected: "NameAndType",
            }),
        }
    }

    /// Descriptor of a field, method or call-site reference
    pub fn member_descriptor(&self, index: u16) -> Result<String, ClassFormatError> {
        let name_and_type_index = match self.get(index)? {
            Constant::Fieldref {
                name_and_type_index,
                ..
            }
            | Constant::Methodref {
                name_and_type_index,
                ..
            }
            | Constant::InterfaceMethodref {
                name_and_type_index,
                ..
            }
            | Constant::InvokeDynamic {
                name_and_type_index,
                ..
            } => *name_and_type_index,
            _ => {
                return Err(ClassFormatError::UnexpectedConstant {
                    index,
                    expected: "member reference",
                })
            }
        };
        match self.get(name_and_type_index)? {
            Constant::NameAndType {
                descriptor_index, ..
            } => self.utf8(*descriptor_index),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index: name_and_type_index,
                expected: "NameAndType",
            }),
        }
    }

    /// Whether `index` names a Utf8 entry equal to `text`, without decoding
    pub fn utf8_equals(&self, index: u16, text: &str) -> bool {
        match self.entries.get(index as usize) {
            Some(Constant::Utf8(bytes)) => *bytes == mutf8::encode(text),
            _ => false,
        }
    }

    fn find(&self, wanted: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|c| c == wanted)
            .map(|i| i as u16)
    }

    fn push(&mut self, constant: Constant) -> Result<u16, ClassFormatError> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(ClassFormatError::ConstantPoolOverflow);
        }
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    fn find_or_push(&mut self, constant: Constant) -> Result<u16, ClassFormatError> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    pub fn add_utf8(&mut self, text: &str) -> Result<u16, ClassFormatError> {
        self.find_or_push(Constant::Utf8(mutf8::encode(text)))
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16, ClassFormatError> {
        self.find_or_push(Constant::Integer(value))
    }

    /// `internal_name` uses slashes (`java/lang/String`)
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16, ClassFormatError> {
        let name_index = self.add_utf8(internal_name)?;
        self.find_or_push(Constant::Class { name_index })
    }

    pub fn add_string(&mut self, text: &str) -> Result<u16, ClassFormatError> {
        let string_index = self.add_utf8(text)?;
        self.find_or_push(Constant::String { string_index })
    }

    pub fn add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFormatError> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.find_or_push(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub fn add_fieldref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFormatError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::Fieldref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_methodref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFormatError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::Methodref {
            class_index,
            name_and_type_index,
        })
    }
}

fn write_pair(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) -> Result<(), ClassFormatError> {
    out.write_u8(tag)?;
    out.write_u16::<BigEndian>(a)?;
    out.write_u16::<BigEndian>(b)?;
    Ok(())
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }
}
