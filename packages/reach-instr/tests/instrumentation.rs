//! Instrumentation, finalization and debug artifacts end to end

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use reach_instr::features::classfile::{op, AttributeInfo};
use reach_instr::shared::constants::access::{ACC_FINAL, ACC_PUBLIC, ACC_STATIC, ACC_TRANSIENT};
use reach_instr::shared::constants::names::MARKER_FIELD;
use reach_instr::{
    build_registry, AppCoordinates, ClassFile, InjectionContext, InstrumentConfig,
    InstrumentError, TypeDescriptor,
};

fn single_trace(bytes: &[u8], config: InstrumentConfig) -> TypeDescriptor {
    let registry = Arc::new(build_registry(&config));
    descriptor_with(bytes, config, registry)
}

fn instrument_all(descriptor: &mut TypeDescriptor) -> Vec<u8> {
    descriptor.visit_constructors(true).expect("constructors");
    descriptor.visit_methods(true).expect("methods");
    descriptor.finalize().expect("finalize");
    descriptor.bytecode().expect("bytecode")
}

#[test]
fn test_single_trace_prepends_guarded_block_to_methods() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();
    let code = method_code(&output, "run");

    assert_eq!(code.code[0], op::GETSTATIC);
    assert_eq!(&code.code[code.code.len() - 3..], &[op::ICONST_1, op::POP, op::RETURN]);
    let catch_types: Vec<String> = code
        .exception_table
        .iter()
        .map(|entry| output.constant_pool.class_name(entry.catch_type).unwrap())
        .collect();
    assert_eq!(
        catch_types,
        vec!["java/lang/IllegalStateException", "java/lang/Throwable"]
    );

    let flag = field_named(&output, "VUL_TRC_RUN_0").expect("trace flag declared");
    assert_eq!(flag.access_flags, ACC_PUBLIC | ACC_STATIC | ACC_TRANSIENT);
    assert_eq!(flag.descriptor(&output.constant_pool).unwrap(), "Z");
    assert!(pool_has_utf8(&output.constant_pool, "a.b.Foo.run()"));
}

#[test]
fn test_constructors_and_initializer_run_original_code_first() {
    let bytes = ClassBuilder::new("a/b/Foo")
        .static_initializer()
        .constructor("(I)V", Body::SuperInitThenWork)
        .build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    let constructor = method_code(&output, "<init>");
    assert_eq!(&constructor.code[..2], &[op::ALOAD_0, op::INVOKESPECIAL]);
    assert!(constructor.code.len() > 8);
    assert_eq!(constructor.code.last(), Some(&op::RETURN));

    let initializer = method_code(&output, "<clinit>");
    assert_eq!(&initializer.code[..2], &[op::ICONST_1, op::POP]);
    assert!(initializer.code.len() > 3);
    assert!(field_named(&output, "VUL_TRC_CLINIT_0").is_some());
    assert!(field_named(&output, "VUL_TRC_INIT_1").is_some());
}

#[test]
fn test_empty_abstract_and_native_bodies_are_skipped() {
    let bytes = ClassBuilder::new("a/b/Foo")
        .default_constructor()
        .method(ACC_PUBLIC, "noop", "()V", Body::Return)
        .native_method("peek", "()I")
        .method(ACC_PUBLIC, "work", "()V", Body::Work)
        .build();
    let recorder = RecordingInstrumentor::new();
    let mut descriptor = descriptor_with(
        &bytes,
        InstrumentConfig::default(),
        registry_of(vec![Box::new(recorder.clone())]),
    );

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    assert_eq!(recorder.seen(), vec!["a.b.Foo.work()"]);
    assert_eq!(method_code(&output, "noop").code, vec![op::RETURN]);
    assert_eq!(method_code(&output, "<init>").code.len(), 5);
}

#[test]
fn test_no_accepting_instrumentor_leaves_code_untouched() {
    let builder = simple_class("a/b/Foo", &["run", "stop"]).static_initializer();
    let original = builder.build_class();
    let mut descriptor = descriptor_with(
        &builder.build(),
        InstrumentConfig::default(),
        registry_of(vec![Box::new(RejectingInstrumentor)]),
    );

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    assert_eq!(output.methods, original.methods);
    assert_eq!(output.fields.len(), 1);
    assert!(field_named(&output, MARKER_FIELD).is_some());
}

#[test]
fn test_marker_field_layout() {
    let config = InstrumentConfig::default().field_annotations(["javax.persistence.Transient"]);
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    let mut descriptor = single_trace(&bytes, config);

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();
    let pool = &output.constant_pool;
    let marker = field_named(&output, MARKER_FIELD).expect("marker field");

    assert_eq!(
        marker.access_flags,
        ACC_PUBLIC | ACC_STATIC | ACC_TRANSIENT | ACC_FINAL
    );
    assert_eq!(marker.descriptor(pool).unwrap(), "Z");
    assert!(AttributeInfo::find(&marker.attributes, pool, "ConstantValue").is_some());
    assert!(AttributeInfo::find(&marker.attributes, pool, "RuntimeVisibleAnnotations").is_some());
    assert!(pool_has_utf8(pool, "Ljavax/persistence/Transient;"));

    // Generated members carry the same annotations
    let flag = field_named(&output, "VUL_TRC_RUN_0").unwrap();
    assert!(AttributeInfo::find(&flag.attributes, pool, "RuntimeVisibleAnnotations").is_some());
}

#[test]
fn test_non_final_marker() {
    let config = InstrumentConfig::default().marker_final(false);
    let bytes = simple_class("a/b/Foo", &[]).build();
    let mut descriptor = single_trace(&bytes, config);

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();
    let marker = field_named(&output, MARKER_FIELD).unwrap();

    assert_eq!(marker.access_flags, ACC_PUBLIC | ACC_STATIC | ACC_TRANSIENT);
    assert!(marker.attributes.is_empty());
}

#[test]
fn test_second_run_is_a_no_op() {
    let bytes = simple_class("a/b/Foo", &["run"]).static_initializer().build();
    let mut first = single_trace(&bytes, InstrumentConfig::default());
    let once = instrument_all(&mut first);

    let recorder = RecordingInstrumentor::new();
    let mut second = descriptor_with(
        &once,
        InstrumentConfig::default(),
        registry_of(vec![Box::new(recorder.clone())]),
    );
    assert!(second.is_instrumented());
    let twice = instrument_all(&mut second);

    assert!(recorder.seen().is_empty());
    assert_eq!(twice, once);
}

#[test]
fn test_direct_instrument_call_respects_marker() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    let once = instrument_all(&mut single_trace(&bytes, InstrumentConfig::default()));
    let mut again = single_trace(&once, InstrumentConfig::default());
    assert!(again.is_instrumented());

    let run = again
        .behaviors()
        .unwrap()
        .into_iter()
        .find(|behavior| behavior.name() == "run")
        .unwrap();
    let construct = again.construct_of(&run).unwrap();

    assert!(!again.instrument(&construct, &run).unwrap());
    let before = method_code(&ClassFile::parse(&once).unwrap(), "run");
    assert_eq!(method_code(again.class_file().unwrap(), "run"), before);
}

#[test]
fn test_direct_instrument_call_skips_empty_and_native_bodies() {
    let bytes = ClassBuilder::new("a/b/Foo")
        .default_constructor()
        .method(ACC_PUBLIC, "noop", "()V", Body::Return)
        .native_method("peek", "()V")
        .build();
    let recorder = RecordingInstrumentor::new();
    let mut descriptor = descriptor_with(
        &bytes,
        InstrumentConfig::default(),
        registry_of(vec![Box::new(recorder.clone())]),
    );

    for behavior in descriptor.behaviors().unwrap() {
        let construct = descriptor.construct_of(&behavior).unwrap();
        assert!(!descriptor.instrument(&construct, &behavior).unwrap());
    }
    assert!(recorder.seen().is_empty());
}

#[test]
fn test_major_version_is_capped_and_minor_kept() {
    let bytes = simple_class("a/b/Foo", &["run"]).version(52, 3).build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    assert_eq!(output.major_version, 51);
    assert_eq!(output.minor_version, 3);
    assert!(method_code(&output, "run")
        .attributes
        .iter()
        .any(|attribute| attribute.name(&output.constant_pool).unwrap() == "StackMapTable"));
}

#[test]
fn test_versions_below_ceiling_are_unchanged() {
    let bytes = simple_class("a/b/Foo", &["run"]).version(49, 0).build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    assert_eq!(output.major_version, 49);
    // No frames before the Java 6 format
    assert!(method_code(&output, "run").attributes.is_empty());
}

#[test]
fn test_bytecode_before_finalize_is_an_error() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());

    assert!(matches!(descriptor.bytecode(), Err(InstrumentError::NotFinalized)));

    descriptor.finalize().unwrap();
    assert!(descriptor.is_finalized());
    assert!(matches!(descriptor.finalize(), Err(InstrumentError::Finalized(_))));
    assert!(matches!(
        descriptor.visit_methods(true),
        Err(InstrumentError::Finalized(_))
    ));
    assert_eq!(descriptor.bytecode().unwrap(), descriptor.bytecode().unwrap());
}

#[test]
fn test_injection_context_reaches_the_callback() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();
    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());
    let context = InjectionContext::new()
        .with_archive_digest("ABC123")
        .with_app(AppCoordinates::new("com.acme", "shop", "1.2.0"));

    descriptor.set_injection_context(context).unwrap();
    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    for text in ["ABC123", "com.acme", "shop", "1.2.0", "METH"] {
        assert!(pool_has_utf8(&output.constant_pool, text), "missing {text}");
    }
}

#[test]
fn test_injection_context_is_set_at_most_once() {
    let bytes = simple_class("a/b/Foo", &["run"]).build();

    let mut descriptor = single_trace(&bytes, InstrumentConfig::default());
    descriptor.set_injection_context(InjectionContext::new()).unwrap();
    assert!(matches!(
        descriptor.set_injection_context(InjectionContext::new()),
        Err(InstrumentError::ContextLocked(_))
    ));

    let mut started = single_trace(&bytes, InstrumentConfig::default());
    started.visit_methods(true).unwrap();
    assert!(matches!(
        started.set_injection_context(InjectionContext::new()),
        Err(InstrumentError::ContextLocked(_))
    ));
}

#[test]
fn test_initializer_returning_with_operands_is_left_intact() {
    let dump = tempfile::tempdir().unwrap();
    let bytes = ClassBuilder::new("a/b/Foo")
        .default_constructor()
        .method(ACC_STATIC, "<clinit>", "()V", Body::Raw(vec![op::ICONST_1, op::RETURN]))
        .build();
    let mut descriptor = single_trace(&bytes, config_with_dump_dir(dump.path()));

    let err = descriptor.visit_constructors(true).unwrap_err();

    assert!(matches!(err, InstrumentError::InjectionFailure { .. }));
    assert!(err.to_string().contains("operand stack"));
    let original = ClassFile::parse(&bytes).unwrap();
    assert_eq!(
        method_code(descriptor.class_file().unwrap(), "<clinit>"),
        method_code(&original, "<clinit>")
    );
}

#[test]
fn test_class_literal_needs_java5_format() {
    let dump = tempfile::tempdir().unwrap();
    let bytes = simple_class("a/b/Foo", &["run"]).version(48, 0).build();
    let mut descriptor = single_trace(&bytes, config_with_dump_dir(dump.path()));

    let err = descriptor.visit_methods(true).unwrap_err();

    assert!(matches!(err, InstrumentError::InjectionFailure { .. }));
    assert!(err.is_construct_local());
}

#[test]
fn test_failed_construct_is_left_intact_and_dumped() {
    let dump = tempfile::tempdir().unwrap();
    let builder = simple_class("a/b/Foo", &["explode"]);
    let original = builder.build_class();
    let mut descriptor = descriptor_with(
        &builder.build(),
        config_with_dump_dir(dump.path()),
        registry_of(vec![Box::new(BrokenInstrumentor::new("explode"))]),
    );

    let err = descriptor.visit_methods(true).unwrap_err();
    assert!(
        matches!(&err, InstrumentError::InjectionFailure { construct, .. } if construct.contains("a.b.Foo.explode()"))
    );

    let source = dump.path().join("a/b/Foo.explode().java");
    let saved = dump.path().join("a/b/Foo.explode().orig.class");
    assert!(source.is_file());
    assert_eq!(std::fs::read(&saved).unwrap(), builder.build());
    assert!(std::fs::read_to_string(&source).unwrap().contains("try {"));

    // The descriptor stays usable and the failed body is unchanged
    descriptor.finalize().unwrap();
    let output = ClassFile::parse(&descriptor.bytecode().unwrap()).unwrap();
    assert_eq!(
        method_code(&output, "explode"),
        method_code(&original, "explode")
    );
}

#[test]
fn test_write_code_dumps_sources_and_class() {
    let dump = tempfile::tempdir().unwrap();
    let config = config_with_dump_dir(dump.path()).write_code(true);
    let bytes = ClassBuilder::new("a/b/Foo")
        .static_initializer()
        .method(ACC_PUBLIC, "run", "(Ljava/lang/String;)V", Body::Work)
        .build();
    let mut descriptor = single_trace(&bytes, config);

    let output = instrument_all(&mut descriptor);

    let method_source = std::fs::read_to_string(dump.path().join("a/b/Foo.run(String).java")).unwrap();
    assert!(method_source.starts_with("public static transient boolean VUL_TRC_RUN_1;"));
    assert!(method_source.contains("callback(\"METH\",\"a.b.Foo.run(String)\""));
    assert!(dump.path().join("a/b/Foo._clinit_.java").is_file());
    assert!(!dump.path().join("a/b/Foo.run(String).orig.class").exists());
    assert_eq!(std::fs::read(dump.path().join("a/b/Foo.class")).unwrap(), output);
}

#[test]
fn test_stack_trace_counter_for_selected_constructs() {
    let config = InstrumentConfig::default()
        .instrumentors(["single-trace", "stack-trace"])
        .stacktrace_constructs(["a.b.Foo.run()"])
        .max_stacktraces(3);
    let bytes = simple_class("a/b/Foo", &["run", "stop"]).build();
    let mut descriptor = single_trace(&bytes, config);

    let output = ClassFile::parse(&instrument_all(&mut descriptor)).unwrap();

    let counter = field_named(&output, "VUL_ST_COUNT_RUN_1").expect("counter for run");
    assert_eq!(counter.descriptor(&output.constant_pool).unwrap(), "I");
    assert!(field_named(&output, "VUL_TRC_STOP_2").is_some());
    assert!(!output
        .fields
        .iter()
        .any(|field| field.name(&output.constant_pool).unwrap().starts_with("VUL_ST_COUNT_STOP")));
    assert!(pool_has_utf8(&output.constant_pool, "callbackStackTrace"));
}
