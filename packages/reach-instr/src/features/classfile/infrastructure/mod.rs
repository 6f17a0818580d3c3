//! Class-file infrastructure
//!
//! - `reader`     - Big-endian byte cursor
//! - `opcodes`    - Instruction boundaries and opcode constants
//! - `stack_map`  - StackMapTable frames and verification types
//! - `relocation` - Offset remapping for code and its tables
//! - `operand_stack` - Stack depth per instruction
//! - `splice`     - Before/after insertion of a generated block

pub mod opcodes;
mod operand_stack;
pub(crate) mod reader;
mod relocation;
pub mod splice;
pub mod stack_map;

pub use opcodes::{decode_instructions, op, Instruction};
pub use splice::{splice, Placement, SpliceBlock, SpliceRequest};
pub use stack_map::{initial_locals, StackMapFrame, VerificationType};
