//! Class-file codec against builder output

mod common;

use common::*;
use pretty_assertions::assert_eq;
use reach_instr::features::classfile::Nesting;
use reach_instr::shared::constants::access::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};
use reach_instr::ClassFile;

#[test]
fn test_unmodified_class_roundtrips_byte_for_byte() {
    let bytes = ClassBuilder::new("a/b/Foo")
        .version(52, 0)
        .field(ACC_PRIVATE, "count", "J")
        .field(ACC_PRIVATE | ACC_STATIC, "name", "Ljava/lang/String;")
        .static_initializer()
        .default_constructor()
        .method(ACC_PUBLIC, "run", "(IJLjava/lang/String;)V", Body::Work)
        .native_method("peek", "()I")
        .build();

    let class = ClassFile::parse(&bytes).unwrap();

    assert_eq!(class.to_bytes().unwrap(), bytes);
    assert_eq!(class.qualified_name().unwrap(), "a.b.Foo");
    assert_eq!(class.super_class_name().unwrap().as_deref(), Some("java/lang/Object"));
    assert!(class.has_field("count"));
    assert!(!class.has_field("missing"));
}

#[test]
fn test_nesting_is_read_from_inner_classes() {
    let inner = ClassFile::parse(
        &ClassBuilder::new("a/Outer$Inner")
            .nested_in("a/Outer", false)
            .build(),
    )
    .unwrap();
    let nested = ClassFile::parse(
        &ClassBuilder::new("a/Outer$Nested")
            .nested_in("a/Outer", true)
            .build(),
    )
    .unwrap();
    let top = ClassFile::parse(&ClassBuilder::new("a/Outer").build()).unwrap();

    assert_eq!(
        inner.nesting().unwrap(),
        Nesting::Nested {
            enclosing: Some("a/Outer".to_string()),
            is_static: false
        }
    );
    assert!(nested.nesting().unwrap().is_static());
    assert_eq!(top.nesting().unwrap(), Nesting::TopLevel);
}

#[test]
fn test_truncated_input_is_an_error() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    for cut in [0, 4, 10, bytes.len() / 2, bytes.len() - 1] {
        assert!(ClassFile::parse(&bytes[..cut]).is_err(), "cut at {cut}");
    }
}
