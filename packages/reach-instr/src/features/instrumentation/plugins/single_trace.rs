//! Single-trace instrumentor
//!
//! Reports the first execution of every behavior per class load:
//!
//! ```text
//! if(!VUL_TRC_M_0){VUL_TRC_M_0=true;<callback>.callback("METH","a.B.m()",$class,...);}
//! ```

use super::trace_callback;
use crate::config::InstrumentConfig;
use crate::errors::Result;
use crate::features::construct_id::ConstructId;
use crate::features::instrumentation::application::TypeDescriptor;
use crate::features::instrumentation::domain::{Behavior, InstrumentationFragment, Statement};
use crate::features::instrumentation::ports::Instrumentor;
use crate::shared::constants::members::TRACE_FLAG_PREFIX;

#[derive(Debug, Clone)]
pub struct SingleTraceInstrumentor {
    callback_class: String,
}

impl SingleTraceInstrumentor {
    pub const NAME: &'static str = "single-trace";
    pub const CALLBACK: &'static str = "callback";

    pub fn new(config: &InstrumentConfig) -> Self {
        Self {
            callback_class: config.callback_class.clone(),
        }
    }
}

impl Instrumentor for SingleTraceInstrumentor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, construct: &ConstructId, _behavior: &Behavior, _descriptor: &TypeDescriptor) -> bool {
        construct.kind().is_behavior()
    }

    fn contribute(
        &self,
        fragment: &mut InstrumentationFragment,
        construct: &ConstructId,
        behavior: &Behavior,
        descriptor: &TypeDescriptor,
    ) -> Result<()> {
        let flag = descriptor.unique_member_name(TRACE_FLAG_PREFIX, behavior.name());
        fragment.declare_flag(flag.clone());
        fragment.push(Statement::Once {
            flag,
            body: vec![Statement::Invoke(trace_callback(
                &self.callback_class,
                Self::CALLBACK,
                construct,
                descriptor,
            ))],
        });
        Ok(())
    }
}
