/*
 * reach-instr - Construct Identification & Bytecode Instrumentation Engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Constants shared across features
 * - features/    : Vertical slices (classfile → construct_id → instrumentation)
 * - config/      : Instrumentation configuration (YAML + env)
 *
 * Given the bytes of one compiled JVM class, the engine derives canonical
 * identities for every construct it declares, injects guarded tracing
 * blocks through pluggable instrumentors, and re-serializes the class.
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Codegen helpers thread many offsets
#![allow(clippy::upper_case_acronyms)] // JVM opcode names
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared constants
pub mod shared;

/// Feature modules (classfile codec, construct identities, instrumentation)
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{global_config, init_global_config, InstrumentConfig};
pub use errors::{InstrumentError, Result};
pub use features::classfile::{ClassFile, ClassFormatError};
pub use features::construct_id::{
    remove_package_context, strip_parameter_qualification, strip_signature_qualification,
    ConstructId, ConstructKind,
};
pub use features::instrumentation::{
    archive_digest, build_registry, global_registry, init_global_registry, instrument_batch,
    pretty_print, AppCoordinates, BatchInput, BatchItem, BatchOptions, Behavior, BehaviorKind,
    InjectionContext, InstrumentationFragment, Instrumentor, InstrumentorRegistry, TypeDescriptor,
};
