//! Stack-trace instrumentor
//!
//! For selected constructs only, calls `callbackStackTrace` on every
//! execution until `max_stacktraces` calls were made (or forever with -1).

use std::collections::HashSet;

use super::trace_callback;
use crate::config::{ConfigError, InstrumentConfig};
use crate::errors::Result;
use crate::features::construct_id::ConstructId;
use crate::features::instrumentation::application::TypeDescriptor;
use crate::features::instrumentation::domain::{Behavior, InstrumentationFragment, Statement};
use crate::features::instrumentation::ports::Instrumentor;
use crate::shared::constants::members::STACKTRACE_COUNTER_PREFIX;

#[derive(Debug, Clone)]
pub struct StackTraceInstrumentor {
    callback_class: String,
    /// `None` = unbounded
    limit: Option<i32>,
    constructs: HashSet<String>,
}

impl StackTraceInstrumentor {
    pub const NAME: &'static str = "stack-trace";
    pub const CALLBACK: &'static str = "callbackStackTrace";

    pub fn new(config: &InstrumentConfig) -> Result<Self> {
        let limit = match config.max_stacktraces {
            -1 => None,
            max if max >= 0 => Some(max),
            max => {
                return Err(ConfigError::range_with_hint(
                    "max_stacktraces",
                    max,
                    -1,
                    i32::MAX,
                    "Use -1 to collect stack traces without limit",
                )
                .into())
            }
        };
        Ok(Self {
            callback_class: config.callback_class.clone(),
            limit,
            constructs: config.stacktrace_constructs.iter().cloned().collect(),
        })
    }

    pub fn is_requested_for(&self, construct: &ConstructId) -> bool {
        self.constructs.contains(&construct.qualified_name())
    }
}

impl Instrumentor for StackTraceInstrumentor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, construct: &ConstructId, _behavior: &Behavior, _descriptor: &TypeDescriptor) -> bool {
        construct.kind().is_behavior() && self.is_requested_for(construct)
    }

    fn contribute(
        &self,
        fragment: &mut InstrumentationFragment,
        construct: &ConstructId,
        behavior: &Behavior,
        descriptor: &TypeDescriptor,
    ) -> Result<()> {
        let call = Statement::Invoke(trace_callback(
            &self.callback_class,
            Self::CALLBACK,
            construct,
            descriptor,
        ));
        match self.limit {
            None => fragment.push(call),
            Some(limit) => {
                let counter = descriptor.unique_member_name(STACKTRACE_COUNTER_PREFIX, behavior.name());
                fragment.declare_counter(counter.clone());
                fragment.push(Statement::Bounded {
                    counter,
                    limit,
                    body: vec![call],
                });
            }
        }
        Ok(())
    }
}
