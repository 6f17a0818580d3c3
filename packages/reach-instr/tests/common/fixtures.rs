//! Test instrumentors and configurations

use std::path::Path;
use std::sync::{Arc, Mutex};

use reach_instr::features::instrumentation::{Argument, Statement, StaticCall};
use reach_instr::{
    Behavior, ConstructId, InstrumentConfig, InstrumentationFragment, Instrumentor,
    InstrumentorRegistry, Result, TypeDescriptor,
};

/// Accepts every behavior, records it, and injects `probe.Recorder.hit(qname)`
#[derive(Debug, Default, Clone)]
pub struct RecordingInstrumentor {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingInstrumentor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("recording lock").clone()
    }
}

impl Instrumentor for RecordingInstrumentor {
    fn name(&self) -> &str {
        "recording"
    }

    fn accepts(&self, construct: &ConstructId, _behavior: &Behavior, _descriptor: &TypeDescriptor) -> bool {
        construct.kind().is_behavior()
    }

    fn contribute(
        &self,
        fragment: &mut InstrumentationFragment,
        construct: &ConstructId,
        _behavior: &Behavior,
        _descriptor: &TypeDescriptor,
    ) -> Result<()> {
        self.seen
            .lock()
            .expect("recording lock")
            .push(construct.qualified_name());
        fragment.push(Statement::Invoke(StaticCall::new(
            "probe.Recorder",
            "hit",
            "(Ljava/lang/String;)V",
            vec![Argument::Str(construct.qualified_name())],
        )));
        Ok(())
    }
}

/// Accepts nothing
#[derive(Debug, Default)]
pub struct RejectingInstrumentor;

impl Instrumentor for RejectingInstrumentor {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn accepts(&self, _construct: &ConstructId, _behavior: &Behavior, _descriptor: &TypeDescriptor) -> bool {
        false
    }

    fn contribute(
        &self,
        _fragment: &mut InstrumentationFragment,
        _construct: &ConstructId,
        _behavior: &Behavior,
        _descriptor: &TypeDescriptor,
    ) -> Result<()> {
        Ok(())
    }
}

/// Contributes a call that cannot be lowered for behaviors named `target`
#[derive(Debug)]
pub struct BrokenInstrumentor {
    target: String,
}

impl BrokenInstrumentor {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

impl Instrumentor for BrokenInstrumentor {
    fn name(&self) -> &str {
        "broken"
    }

    fn accepts(&self, _construct: &ConstructId, behavior: &Behavior, _descriptor: &TypeDescriptor) -> bool {
        behavior.name() == self.target
    }

    fn contribute(
        &self,
        fragment: &mut InstrumentationFragment,
        _construct: &ConstructId,
        _behavior: &Behavior,
        _descriptor: &TypeDescriptor,
    ) -> Result<()> {
        // Argument count does not match the descriptor
        fragment.push(Statement::Invoke(StaticCall::new(
            "probe.Recorder",
            "hit",
            "(Ljava/lang/String;)V",
            Vec::new(),
        )));
        Ok(())
    }
}

pub fn registry_of(instrumentors: Vec<Box<dyn Instrumentor>>) -> Arc<InstrumentorRegistry> {
    Arc::new(InstrumentorRegistry::from_instrumentors(instrumentors))
}

/// Defaults with debug artifacts going to `dump_dir`
pub fn config_with_dump_dir(dump_dir: &Path) -> InstrumentConfig {
    InstrumentConfig::default().dump_dir(dump_dir)
}

pub fn descriptor_with(
    bytes: &[u8],
    config: InstrumentConfig,
    registry: Arc<InstrumentorRegistry>,
) -> TypeDescriptor {
    TypeDescriptor::with_registry(bytes, Arc::new(config), registry).expect("parse test class")
}
