//! Type descriptor
//!
//! Wraps one parsed class: derives the identities of everything it
//! declares, drives instrumentors over its behaviors and splices their
//! fragments into the bytecode. Finalization lives in `finalizer.rs`.
//!
//! Lifecycle: `from_bytes` → `constructs` / `visit_*` (any number of times)
//! → `finalize` (once) → `bytecode`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::config::{global_config, InstrumentConfig};
use crate::errors::{InstrumentError, Result};
use crate::features::classfile::{
    initial_locals, op, splice, ClassFile, CodeAttribute, ConstantPool, Nesting, Placement,
    SpliceRequest, VerificationType,
};
use crate::features::construct_id::{
    remove_package_context, split_parameter_types, strip_parameter_qualification, ConstructId,
};
use crate::features::instrumentation::domain::{
    Behavior, BehaviorKind, InjectionContext, InstrumentationFragment,
};
use crate::features::instrumentation::infrastructure::debug_dump::{
    write_original_artifact, write_source_artifact,
};
use crate::features::instrumentation::infrastructure::{
    global_registry, lower_guarded, LoweringTarget,
};
use crate::features::instrumentation::ports::InstrumentorRegistry;
use crate::shared::constants::access::{ACC_PUBLIC, ACC_STATIC, ACC_TRANSIENT};
use crate::shared::constants::{format, names};

const STATE_UNKNOWN: u8 = 0;
const STATE_CLEAN: u8 = 1;
pub(super) const STATE_INSTRUMENTED: u8 = 2;

pub struct TypeDescriptor {
    /// `None` once finalized
    pub(super) class: Option<ClassFile>,
    original: Vec<u8>,
    id: ConstructId,
    qualified_name: String,
    internal_name: String,
    pub(super) major_version: u16,
    pub(super) minor_version: u16,
    nesting: Nesting,
    /// Simple name expected as the synthetic first constructor parameter
    outer_parameter: Option<String>,
    pub(super) config: Arc<InstrumentConfig>,
    registry: Arc<InstrumentorRegistry>,
    constructs: OnceLock<BTreeSet<ConstructId>>,
    pub(super) instrumented: AtomicU8,
    context: InjectionContext,
    context_locked: bool,
    member_counter: AtomicU32,
    warnings: Vec<InstrumentError>,
    pub(super) bytecode: Option<Vec<u8>>,
}

impl TypeDescriptor {
    /// Parses `bytes` using the global configuration and registry
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::with_registry(bytes, global_config(), global_registry())
    }

    pub fn with_registry(
        bytes: &[u8],
        config: Arc<InstrumentConfig>,
        registry: Arc<InstrumentorRegistry>,
    ) -> Result<Self> {
        let class = ClassFile::parse(bytes)?;
        let internal_name = class.this_class_name()?;
        let qualified_name = internal_name.replace('/', ".");

        if class.is_interface() {
            return Err(InstrumentError::UnsupportedConstructKind {
                type_name: qualified_name,
            });
        }

        let nesting = class.nesting()?;
        let mut warnings = Vec::new();
        let outer_parameter = match &nesting {
            Nesting::Nested {
                enclosing: Some(enclosing),
                is_static: false,
            } => Some(remove_package_context(&enclosing.replace('/', "."))),
            Nesting::Nested {
                enclosing: None,
                is_static: false,
            } => {
                warn!(class = %qualified_name, "no enclosing type found, constructor signatures keep all parameters");
                warnings.push(InstrumentError::EnclosingTypeUnresolved {
                    type_name: qualified_name.clone(),
                });
                None
            }
            _ => None,
        };

        Ok(Self {
            id: ConstructId::of_type(qualified_name.clone(), class.is_enum()),
            major_version: class.major_version,
            minor_version: class.minor_version,
            class: Some(class),
            original: bytes.to_vec(),
            qualified_name,
            internal_name,
            nesting,
            outer_parameter,
            config,
            registry,
            constructs: OnceLock::new(),
            instrumented: AtomicU8::new(STATE_UNKNOWN),
            context: InjectionContext::default(),
            context_locked: false,
            member_counter: AtomicU32::new(0),
            warnings,
            bytecode: None,
        })
    }

    /// Dotted name, e.g. `a.b.Outer$Inner`
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Identity of the type itself
    pub fn construct_id(&self) -> &ConstructId {
        &self.id
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn nesting(&self) -> &Nesting {
        &self.nesting
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn injection_context(&self) -> &InjectionContext {
        &self.context
    }

    /// Non-fatal problems found while analysing the type
    pub fn warnings(&self) -> &[InstrumentError] {
        &self.warnings
    }

    pub fn is_finalized(&self) -> bool {
        self.class.is_none()
    }

    pub fn class_file(&self) -> Result<&ClassFile> {
        self.class
            .as_ref()
            .ok_or_else(|| InstrumentError::Finalized(self.qualified_name.clone()))
    }

    /// Must be called before the first construct is instrumented, at most once
    pub fn set_injection_context(&mut self, context: InjectionContext) -> Result<()> {
        if self.context_locked {
            return Err(InstrumentError::ContextLocked(self.qualified_name.clone()));
        }
        self.context = context;
        self.context_locked = true;
        Ok(())
    }

    /// Probes for the marker field once; a positive answer is final
    pub fn is_instrumented(&self) -> bool {
        match self.instrumented.load(Ordering::Acquire) {
            STATE_INSTRUMENTED => true,
            STATE_CLEAN => false,
            _ => {
                let found = self
                    .class
                    .as_ref()
                    .is_some_and(|class| class.has_field(names::MARKER_FIELD));
                let state = if found { STATE_INSTRUMENTED } else { STATE_CLEAN };
                // Never downgrade a concurrent positive answer
                let _ = self.instrumented.compare_exchange(
                    STATE_UNKNOWN,
                    state,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                self.instrumented.load(Ordering::Acquire) == STATE_INSTRUMENTED
            }
        }
    }

    /// `PREFIX_NAME_<n>` with `<`/`>` removed and the name upper-cased;
    /// unique within this descriptor and against existing fields
    pub fn unique_member_name(&self, prefix: &str, construct_name: &str) -> String {
        let name = construct_name.replace(['<', '>'], "").to_uppercase();
        loop {
            let n = self.member_counter.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{name}_{n}");
            let taken = self
                .class
                .as_ref()
                .is_some_and(|class| class.has_field(&candidate));
            if !taken {
                return candidate;
            }
        }
    }

    /// All methods, constructors and the static initializer, in table order
    pub fn behaviors(&self) -> Result<Vec<Behavior>> {
        let class = self.class_file()?;
        class
            .methods
            .iter()
            .enumerate()
            .map(|(index, member)| {
                Behavior::from_member(index, member, &class.constant_pool)
                    .map_err(InstrumentError::from)
            })
            .collect()
    }

    /// Every construct the type declares; computed once
    pub fn constructs(&self) -> Result<&BTreeSet<ConstructId>> {
        if let Some(constructs) = self.constructs.get() {
            return Ok(constructs);
        }

        let mut constructs = BTreeSet::new();
        constructs.insert(self.id.clone());
        if let Some(package) = ConstructId::package_of(&self.qualified_name) {
            constructs.insert(package);
        }
        for behavior in self.behaviors()? {
            if behavior.kind() == BehaviorKind::StaticInitializer && !self.lists_static_initializer() {
                continue;
            }
            constructs.insert(self.construct_of(&behavior)?);
        }
        Ok(self.constructs.get_or_init(|| constructs))
    }

    /// Only class types (not enums) expose their static initializer
    fn lists_static_initializer(&self) -> bool {
        !matches!(self.id, ConstructId::Type { is_enum: true, .. })
    }

    /// Identity of one behavior, with the synthetic outer-instance
    /// parameter elided for constructors of inner classes
    pub fn construct_of(&self, behavior: &Behavior) -> Result<ConstructId> {
        if behavior.kind() == BehaviorKind::StaticInitializer {
            return Ok(ConstructId::static_initializer(self.qualified_name.clone()));
        }

        let descriptor = behavior.parsed_descriptor()?;
        let mut parameters =
            split_parameter_types(&strip_parameter_qualification(&descriptor.parameter_list_text()));

        if behavior.kind() == BehaviorKind::Method {
            return Ok(ConstructId::method(
                self.qualified_name.clone(),
                behavior.name(),
                parameters,
            ));
        }

        let mut elided = false;
        if let Some(outer) = &self.outer_parameter {
            match parameters.first() {
                Some(first) if first.ends_with(outer.as_str()) => {
                    parameters.remove(0);
                    elided = true;
                }
                Some(first) => warn!(
                    class = %self.qualified_name,
                    expected = %outer,
                    found = %first,
                    "first constructor parameter is not the enclosing type"
                ),
                None => warn!(
                    class = %self.qualified_name,
                    expected = %outer,
                    "constructor of inner class has no parameters"
                ),
            }
        }
        Ok(ConstructId::constructor(
            self.qualified_name.clone(),
            parameters,
            elided,
        ))
    }

    /// Lists (and optionally instruments) the declared methods
    pub fn visit_methods(&mut self, instrument: bool) -> Result<BTreeSet<ConstructId>> {
        let methods: Vec<Behavior> = self
            .behaviors()?
            .into_iter()
            .filter(|behavior| behavior.kind() == BehaviorKind::Method)
            .collect();

        let mut constructs = BTreeSet::new();
        for behavior in &methods {
            let construct = self.construct_of(behavior)?;
            if instrument {
                self.instrument(&construct, behavior)?;
            }
            constructs.insert(construct);
        }
        debug!(class = %self.qualified_name, methods = methods.len(), "visited methods");
        Ok(constructs)
    }

    /// Lists (and optionally instruments) the static initializer and constructors
    pub fn visit_constructors(&mut self, instrument: bool) -> Result<BTreeSet<ConstructId>> {
        let behaviors = self.behaviors()?;
        let initializer = behaviors
            .iter()
            .find(|behavior| behavior.kind() == BehaviorKind::StaticInitializer)
            .filter(|_| self.lists_static_initializer());
        let constructors: Vec<&Behavior> = behaviors
            .iter()
            .filter(|behavior| behavior.kind() == BehaviorKind::Constructor)
            .collect();

        let mut constructs = BTreeSet::new();
        for behavior in initializer.into_iter().chain(constructors.iter().copied()) {
            let construct = self.construct_of(behavior)?;
            if instrument {
                self.instrument(&construct, behavior)?;
            }
            constructs.insert(construct);
        }
        debug!(
            class = %self.qualified_name,
            constructors = constructors.len(),
            "visited constructors"
        );
        Ok(constructs)
    }

    fn should_instrument(&self, behavior: &Behavior) -> Result<bool> {
        if self.is_instrumented() || behavior.is_native() || behavior.is_abstract() {
            return Ok(false);
        }
        let class = self.class_file()?;
        let member = &class.methods[behavior.index()];
        let code = member.code(&class.constant_pool)?;
        Ok(!is_empty_body(
            behavior.kind(),
            code.as_ref(),
            &class.constant_pool,
            class.super_class,
        ))
    }

    /// Runs the registry over one behavior and splices the result.
    /// Returns whether the bytecode changed.
    ///
    /// Already-instrumented types, native or abstract behaviors and empty
    /// bodies are left alone.
    pub fn instrument(&mut self, construct: &ConstructId, behavior: &Behavior) -> Result<bool> {
        self.class_file()?;
        if !self.should_instrument(behavior)? {
            return Ok(false);
        }
        self.context_locked = true;

        let registry = Arc::clone(&self.registry);
        let mut fragment = InstrumentationFragment::new();
        for instrumentor in registry.iter() {
            if instrumentor.accepts(construct, behavior, self) {
                instrumentor.contribute(&mut fragment, construct, behavior, self)?;
            }
        }
        if fragment.is_empty() {
            return Ok(false);
        }

        let construct_name = construct.to_string();
        let result = self
            .splice_fragment(&fragment, &construct_name, behavior)
            .map_err(|err| match err {
                err @ InstrumentError::InjectionFailure { .. } => err,
                other => InstrumentError::injection(&construct_name, other.to_string()),
            });

        if self.config.write_code || result.is_err() {
            let dump_dir = self.config.dump_dir.clone();
            let path = write_source_artifact(&dump_dir, construct, &fragment.guarded_source(&construct_name));
            if let Err(err) = &result {
                write_original_artifact(&dump_dir, construct, &self.original);
                warn!(
                    construct = %construct,
                    error = %err,
                    source = ?path,
                    "cannot inject instrumentation code"
                );
            }
        }
        result.map(|()| true)
    }

    fn splice_fragment(
        &mut self,
        fragment: &InstrumentationFragment,
        construct_name: &str,
        behavior: &Behavior,
    ) -> Result<()> {
        let major_version = self.major_version;
        let internal_name = self.internal_name.clone();
        let annotations = self.config.field_annotations.clone();
        let class = self
            .class
            .as_mut()
            .ok_or_else(|| InstrumentError::Finalized(self.qualified_name.clone()))?;

        let code = class
            .methods
            .get(behavior.index())
            .ok_or_else(|| InstrumentError::injection(construct_name, "behavior is not in the method table"))?
            .code(&class.constant_pool)?
            .ok_or_else(|| InstrumentError::injection(construct_name, "behavior has no code"))?;

        // Work on a copy so a failed splice leaves the pool untouched
        let mut pool = class.constant_pool.clone();
        let descriptor = behavior.parsed_descriptor()?;
        let entry_locals = initial_locals(
            &mut pool,
            class.this_class,
            behavior.is_static(),
            behavior.kind() == BehaviorKind::Constructor,
            &descriptor,
        )?;
        let (placement, block_locals) = match behavior.kind() {
            BehaviorKind::Method => (Placement::Before, entry_locals.clone()),
            BehaviorKind::Constructor => (
                Placement::After,
                vec![VerificationType::Object(class.this_class)],
            ),
            BehaviorKind::StaticInitializer => (Placement::After, Vec::new()),
        };

        let block = lower_guarded(
            fragment,
            &mut pool,
            &LoweringTarget {
                this_class: &internal_name,
                major_version,
                construct: construct_name,
                locals: block_locals,
            },
        )?;
        let request = SpliceRequest {
            placement,
            block,
            entry_locals,
            emit_frames: major_version >= format::JAVA_6,
        };
        let spliced = splice(&code, &mut pool, &request)?;

        let mut members = Vec::new();
        for member in fragment.members() {
            if !class.has_field(&member.name) {
                let attributes = super::finalizer::annotation_attributes(&mut pool, &annotations)?;
                members.push((member.name.clone(), member.kind, attributes));
            }
        }

        class.constant_pool = pool;
        class.methods[behavior.index()].set_code(&mut class.constant_pool, &spliced)?;
        for (name, kind, attributes) in members {
            class.add_field(
                ACC_PUBLIC | ACC_STATIC | ACC_TRANSIENT,
                &name,
                kind.descriptor(),
                attributes,
            )?;
        }
        debug!(construct = %construct_name, bytes = spliced.code.len(), "instrumented");
        Ok(())
    }
}

/// No code, a lone `return`, or (constructors) just `super()` plus `return`
pub(crate) fn is_empty_body(
    kind: BehaviorKind,
    code: Option<&CodeAttribute>,
    pool: &ConstantPool,
    super_class: u16,
) -> bool {
    let Some(code) = code else {
        return true;
    };
    match code.code.as_slice() {
        [op::RETURN] => true,
        [op::ALOAD_0, op::INVOKESPECIAL, hi, lo, op::RETURN] if kind == BehaviorKind::Constructor => {
            let index = u16::from_be_bytes([*hi, *lo]);
            let super_name = pool.class_name(super_class).ok();
            match pool.method_ref(index) {
                Ok((owner, name, descriptor)) => {
                    name == names::CONSTRUCTOR
                        && descriptor == "()V"
                        && super_name.as_deref() == Some(owner.as_str())
                }
                Err(_) => false,
            }
        }
        _ => false,
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("qualified_name", &self.qualified_name)
            .field("major_version", &self.major_version)
            .field("minor_version", &self.minor_version)
            .field("nesting", &self.nesting)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
