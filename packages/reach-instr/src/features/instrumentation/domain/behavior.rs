//! Behavior handles
//!
//! A `Behavior` points at one entry of the method table together with the
//! data instrumentors need to decide whether they apply.

use std::fmt;

use crate::features::classfile::{ClassFormatError, ConstantPool, MemberInfo, MethodDescriptor};
use crate::shared::constants::access::{ACC_ABSTRACT, ACC_NATIVE, ACC_STATIC};
use crate::shared::constants::names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    Method,
    Constructor,
    StaticInitializer,
}

impl BehaviorKind {
    pub fn of_name(name: &str) -> Self {
        match name {
            names::CONSTRUCTOR => BehaviorKind::Constructor,
            names::STATIC_INITIALIZER => BehaviorKind::StaticInitializer,
            _ => BehaviorKind::Method,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Method => "method",
            BehaviorKind::Constructor => "constructor",
            BehaviorKind::StaticInitializer => "static initializer",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    index: usize,
    name: String,
    descriptor: String,
    kind: BehaviorKind,
    access_flags: u16,
}

impl Behavior {
    pub(crate) fn from_member(
        index: usize,
        member: &MemberInfo,
        pool: &ConstantPool,
    ) -> Result<Self, ClassFormatError> {
        let name = member.name(pool)?;
        Ok(Self {
            index,
            kind: BehaviorKind::of_name(&name),
            name,
            descriptor: member.descriptor(pool)?,
            access_flags: member.access_flags,
        })
    }

    /// Position in the method table
    pub fn index(&self) -> usize {
        self.index
    }

    /// `m`, `<init>` or `<clinit>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor, ClassFormatError> {
        MethodDescriptor::parse(&self.descriptor)
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_name() {
        assert_eq!(BehaviorKind::of_name("<init>"), BehaviorKind::Constructor);
        assert_eq!(BehaviorKind::of_name("<clinit>"), BehaviorKind::StaticInitializer);
        assert_eq!(BehaviorKind::of_name("run"), BehaviorKind::Method);
    }

    #[test]
    fn test_from_member() {
        let mut pool = ConstantPool::default();
        let member = MemberInfo {
            access_flags: ACC_STATIC | ACC_NATIVE,
            name_index: pool.add_utf8("load").unwrap(),
            descriptor_index: pool.add_utf8("(I)V").unwrap(),
            attributes: Vec::new(),
        };
        let behavior = Behavior::from_member(3, &member, &pool).unwrap();
        assert_eq!(behavior.index(), 3);
        assert_eq!(behavior.name(), "load");
        assert_eq!(behavior.kind(), BehaviorKind::Method);
        assert!(behavior.is_static() && behavior.is_native());
        assert_eq!(behavior.parsed_descriptor().unwrap().parameters.len(), 1);
    }
}
