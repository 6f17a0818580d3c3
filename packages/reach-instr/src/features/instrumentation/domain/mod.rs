//! Instrumentation domain models

mod behavior;
mod fragment;
mod injection_context;

pub use behavior::{Behavior, BehaviorKind};
pub use fragment::{
    Argument, InstrumentationFragment, MemberDecl, MemberKind, Statement, StaticCall,
};
pub use injection_context::{AppCoordinates, InjectionContext};
