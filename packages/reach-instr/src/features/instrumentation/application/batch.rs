//! Parallel batch driver
//!
//! Each input type gets its own `TypeDescriptor` on a rayon worker. A
//! failure is recorded against its input and never affects the others.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use super::type_descriptor::TypeDescriptor;
use crate::config::{global_config, InstrumentConfig};
use crate::errors::{InstrumentError, Result};
use crate::features::construct_id::ConstructId;
use crate::features::instrumentation::domain::InjectionContext;
use crate::features::instrumentation::infrastructure::global_registry;
use crate::features::instrumentation::ports::InstrumentorRegistry;

/// One compiled type to process
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Caller label, usually the file or archive entry name
    pub name: String,
    pub bytes: Vec<u8>,
    /// Overrides the batch-wide context
    pub context: Option<InjectionContext>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            context: None,
        }
    }

    pub fn with_context(mut self, context: InjectionContext) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Clone)]
pub struct BatchOptions {
    /// List only when false
    pub instrument: bool,
    pub context: InjectionContext,
    pub config: Arc<InstrumentConfig>,
    pub registry: Arc<InstrumentorRegistry>,
}

impl BatchOptions {
    pub fn new(config: Arc<InstrumentConfig>, registry: Arc<InstrumentorRegistry>) -> Self {
        Self {
            instrument: true,
            context: InjectionContext::default(),
            config,
            registry,
        }
    }

    pub fn from_globals() -> Self {
        Self::new(global_config(), global_registry())
    }

    pub fn instrument(mut self, instrument: bool) -> Self {
        self.instrument = instrument;
        self
    }

    pub fn context(mut self, context: InjectionContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug)]
pub enum BatchItem {
    Ok {
        name: String,
        qualified_name: String,
        constructs: BTreeSet<ConstructId>,
        /// Rewritten bytes, or the input bytes when only listing
        bytes: Vec<u8>,
    },
    Failed {
        name: String,
        error: InstrumentError,
        /// Input bytes, for callers that fall back to the unmodified type
        original: Vec<u8>,
    },
}

impl BatchItem {
    pub fn name(&self) -> &str {
        match self {
            BatchItem::Ok { name, .. } | BatchItem::Failed { name, .. } => name,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, BatchItem::Ok { .. })
    }

    /// Bytes to ship: rewritten on success, original on failure
    pub fn output_bytes(&self) -> &[u8] {
        match self {
            BatchItem::Ok { bytes, .. } => bytes,
            BatchItem::Failed { original, .. } => original,
        }
    }
}

/// Processes `inputs` in parallel; the result order matches the input order
pub fn instrument_batch(inputs: Vec<BatchInput>, options: &BatchOptions) -> Vec<BatchItem> {
    let total = inputs.len();
    let items: Vec<BatchItem> = inputs
        .into_par_iter()
        .map(|input| match process(&input, options) {
            Ok((qualified_name, constructs, bytes)) => BatchItem::Ok {
                name: input.name,
                qualified_name,
                constructs,
                bytes,
            },
            Err(error) => {
                warn!(input = %input.name, error = %error, "type left unmodified");
                BatchItem::Failed {
                    name: input.name,
                    error,
                    original: input.bytes,
                }
            }
        })
        .collect();

    let failed = items.iter().filter(|item| !item.is_ok()).count();
    info!(types = total, failed, "batch finished");
    items
}

fn process(
    input: &BatchInput,
    options: &BatchOptions,
) -> Result<(String, BTreeSet<ConstructId>, Vec<u8>)> {
    let mut descriptor = TypeDescriptor::with_registry(
        &input.bytes,
        Arc::clone(&options.config),
        Arc::clone(&options.registry),
    )?;

    let context = input.context.as_ref().unwrap_or(&options.context);
    if !context.is_empty() {
        descriptor.set_injection_context(context.clone())?;
    }

    let constructs = descriptor.constructs()?.clone();
    let qualified_name = descriptor.qualified_name().to_string();
    if !options.instrument {
        return Ok((qualified_name, constructs, input.bytes.clone()));
    }

    descriptor.visit_constructors(true)?;
    descriptor.visit_methods(true)?;
    descriptor.finalize()?;
    Ok((qualified_name, constructs, descriptor.bytecode()?))
}
