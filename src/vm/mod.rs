//! Register-based virtual machine
//!
//! This module contains the execution engine: the register file, memory
//! region, tagged stack, flags, native callback registry, opcode dispatcher,
//! and binary state snapshots.

mod errors;
mod execution;
mod memory;
mod natives;
mod registers;
mod snapshot;
mod stack;
mod types;

pub use errors::{SnapshotError, VMError};
pub use execution::VMExecution;
pub use memory::VMMemory;
pub use natives::{NativeFn, NativeRegistry};
pub use registers::Registers;
pub use snapshot::{VMState, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use stack::VMStack;
pub use types::{Control, Flags, Instruction, Opcode, StackSlot, StepOutcome};

// Main VM struct that coordinates components
#[allow(clippy::module_inception)]
mod vm;
pub use vm::VM;
