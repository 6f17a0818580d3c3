//! Class-file builders
//!
//! Produces real class bytes through the public codec.

use reach_instr::features::classfile::{
    op, AttributeInfo, ClassFile, CodeAttribute, ConstantPool, MemberInfo, MethodDescriptor,
};
use reach_instr::shared::constants::access::{
    ACC_ABSTRACT, ACC_ENUM, ACC_INTERFACE, ACC_NATIVE, ACC_PUBLIC, ACC_STATIC,
};

const ACC_SUPER: u16 = 0x0020;
const IRETURN: u8 = 0xac;

/// Method body shapes used across the tests
#[derive(Debug, Clone)]
pub enum Body {
    /// `return`
    Return,
    /// `aload_0; invokespecial <super>.<init>()V; return`
    SuperInit,
    /// `super()` followed by real work, then `return`
    SuperInitThenWork,
    /// `iconst_1; pop; return`
    Work,
    /// `iconst_1; ireturn`
    ReturnOne,
    /// No `Code` attribute (abstract or native)
    Absent,
    Raw(Vec<u8>),
}

#[derive(Debug, Clone)]
struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    body: Body,
}

#[derive(Debug, Clone)]
struct InnerSpec {
    outer: Option<String>,
    is_static: bool,
}

/// Builder for one compiled type
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_name: String,
    access: u16,
    major: u16,
    minor: u16,
    fields: Vec<(u16, String, String)>,
    methods: Vec<MethodSpec>,
    inner: Option<InnerSpec>,
}

impl ClassBuilder {
    /// `name` is the internal name, e.g. `a/b/Foo`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            access: ACC_PUBLIC | ACC_SUPER,
            major: 51,
            minor: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            inner: None,
        }
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn interface(mut self) -> Self {
        self.access = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        self
    }

    pub fn enumeration(mut self) -> Self {
        self.access |= ACC_ENUM;
        self.super_name = "java/lang/Enum".to_string();
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.fields
            .push((access, name.to_string(), descriptor.to_string()));
        self
    }

    pub fn method(mut self, access: u16, name: &str, descriptor: &str, body: Body) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            body,
        });
        self
    }

    pub fn constructor(self, descriptor: &str, body: Body) -> Self {
        self.method(ACC_PUBLIC, "<init>", descriptor, body)
    }

    pub fn default_constructor(self) -> Self {
        self.constructor("()V", Body::SuperInit)
    }

    pub fn static_initializer(self) -> Self {
        self.method(ACC_STATIC, "<clinit>", "()V", Body::Work)
    }

    pub fn native_method(self, name: &str, descriptor: &str) -> Self {
        self.method(ACC_PUBLIC | ACC_NATIVE, name, descriptor, Body::Absent)
    }

    /// Member of `outer` (internal name) per `InnerClasses`
    pub fn nested_in(mut self, outer: &str, is_static: bool) -> Self {
        self.inner = Some(InnerSpec {
            outer: Some(outer.to_string()),
            is_static,
        });
        self
    }

    /// Non-static nested type whose enclosing type is not recorded
    pub fn nested_without_enclosing(mut self) -> Self {
        self.inner = Some(InnerSpec {
            outer: None,
            is_static: false,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_class()
            .to_bytes()
            .expect("serialize built class")
    }

    pub fn build_class(&self) -> ClassFile {
        let mut pool = ConstantPool::default();
        let this_class = pool.add_class(&self.name).expect("this class");
        let super_class = pool.add_class(&self.super_name).expect("super class");

        let fields = self
            .fields
            .iter()
            .map(|(access, name, descriptor)| MemberInfo {
                access_flags: *access,
                name_index: pool.add_utf8(name).expect("field name"),
                descriptor_index: pool.add_utf8(descriptor).expect("field descriptor"),
                attributes: Vec::new(),
            })
            .collect();

        let methods = self
            .methods
            .iter()
            .map(|spec| self.build_method(&mut pool, spec))
            .collect();

        let mut attributes = Vec::new();
        if let Some(inner) = &self.inner {
            let mut info = Vec::new();
            info.extend_from_slice(&1u16.to_be_bytes());
            info.extend_from_slice(&this_class.to_be_bytes());
            let outer_index = match &inner.outer {
                Some(outer) => pool.add_class(outer).expect("outer class"),
                None => 0,
            };
            info.extend_from_slice(&outer_index.to_be_bytes());
            let simple = self.name.rsplit('$').next().unwrap_or(&self.name);
            info.extend_from_slice(&pool.add_utf8(simple).expect("inner name").to_be_bytes());
            let flags = if inner.is_static {
                ACC_PUBLIC | ACC_STATIC
            } else {
                ACC_PUBLIC
            };
            info.extend_from_slice(&flags.to_be_bytes());
            attributes.push(AttributeInfo {
                name_index: pool.add_utf8("InnerClasses").expect("attribute name"),
                info,
            });
        }

        ClassFile {
            minor_version: self.minor,
            major_version: self.major,
            constant_pool: pool,
            access_flags: self.access,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields,
            methods,
            attributes,
        }
    }

    fn build_method(&self, pool: &mut ConstantPool, spec: &MethodSpec) -> MemberInfo {
        let descriptor = MethodDescriptor::parse(&spec.descriptor).expect("method descriptor");
        let this_slot = u16::from(spec.access & ACC_STATIC == 0);
        let max_locals = descriptor.parameter_slots() + this_slot;

        let super_init = |pool: &mut ConstantPool| {
            let index = pool
                .add_methodref(&self.super_name, "<init>", "()V")
                .expect("super constructor ref");
            let [hi, lo] = index.to_be_bytes();
            vec![op::ALOAD_0, op::INVOKESPECIAL, hi, lo]
        };
        let code = match &spec.body {
            Body::Return => Some(vec![op::RETURN]),
            Body::SuperInit => {
                let mut code = super_init(pool);
                code.push(op::RETURN);
                Some(code)
            }
            Body::SuperInitThenWork => {
                let mut code = super_init(pool);
                code.extend_from_slice(&[op::ICONST_1, op::POP, op::RETURN]);
                Some(code)
            }
            Body::Work => Some(vec![op::ICONST_1, op::POP, op::RETURN]),
            Body::ReturnOne => Some(vec![op::ICONST_1, IRETURN]),
            Body::Absent => None,
            Body::Raw(code) => Some(code.clone()),
        };

        let mut member = MemberInfo {
            access_flags: spec.access,
            name_index: pool.add_utf8(&spec.name).expect("method name"),
            descriptor_index: pool.add_utf8(&spec.descriptor).expect("method descriptor"),
            attributes: Vec::new(),
        };
        if let Some(code) = code {
            let attribute = CodeAttribute {
                max_stack: 2,
                max_locals,
                code,
                exception_table: Vec::new(),
                attributes: Vec::new(),
            };
            member.set_code(pool, &attribute).expect("code attribute");
        }
        member
    }
}

/// Top-level class with a default constructor and the given `()V`/`()I` methods
pub fn simple_class(name: &str, methods: &[&str]) -> ClassBuilder {
    methods.iter().fold(
        ClassBuilder::new(name).default_constructor(),
        |builder, method| builder.method(ACC_PUBLIC, method, "()V", Body::Work),
    )
}

/// Code of the first method called `name`
pub fn method_code(class: &ClassFile, name: &str) -> CodeAttribute {
    class
        .methods
        .iter()
        .find(|method| method.name(&class.constant_pool).unwrap() == name)
        .and_then(|method| method.code(&class.constant_pool).unwrap())
        .unwrap_or_else(|| panic!("method {name} with code"))
}

pub fn field_named<'a>(class: &'a ClassFile, name: &str) -> Option<&'a MemberInfo> {
    class
        .fields
        .iter()
        .find(|field| field.name(&class.constant_pool).unwrap() == name)
}

/// Whether any Utf8 constant equals `text`
pub fn pool_has_utf8(pool: &ConstantPool, text: &str) -> bool {
    (1..pool.count()).any(|index| pool.utf8(index).is_ok_and(|value| value == text))
}
