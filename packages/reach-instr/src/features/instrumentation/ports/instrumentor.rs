use crate::errors::Result;
use crate::features::construct_id::ConstructId;
use crate::features::instrumentation::application::TypeDescriptor;
use crate::features::instrumentation::domain::{Behavior, InstrumentationFragment};

/// Pluggable strategy deciding what code is injected into a construct
pub trait Instrumentor: Send + Sync {
    /// Name used in the `instrumentors` configuration list
    fn name(&self) -> &str;

    /// Whether `contribute` should run for this construct
    fn accepts(&self, construct: &ConstructId, behavior: &Behavior, descriptor: &TypeDescriptor)
        -> bool;

    /// Appends statements (and the members they use) to `fragment`
    fn contribute(
        &self,
        fragment: &mut InstrumentationFragment,
        construct: &ConstructId,
        behavior: &Behavior,
        descriptor: &TypeDescriptor,
    ) -> Result<()>;
}

/// Ordered, immutable-after-build list of instrumentors
pub struct InstrumentorRegistry {
    instrumentors: Vec<Box<dyn Instrumentor>>,
}

impl InstrumentorRegistry {
    pub fn new() -> Self {
        Self {
            instrumentors: Vec::new(),
        }
    }

    pub fn from_instrumentors(instrumentors: Vec<Box<dyn Instrumentor>>) -> Self {
        Self { instrumentors }
    }

    /// Appends an instrumentor; registration order is contribution order
    pub fn register(&mut self, instrumentor: Box<dyn Instrumentor>) {
        self.instrumentors.push(instrumentor);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Instrumentor> {
        self.instrumentors.iter().map(|i| i.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.instrumentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrumentors.is_empty()
    }
}

impl Default for InstrumentorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstrumentorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentorRegistry")
            .field("instrumentors", &self.names())
            .finish()
    }
}
