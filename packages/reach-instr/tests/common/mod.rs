//! Common test utilities for reach-instr
//!
//! Builders for real class bytes plus instrumentors with observable
//! behavior.

#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
