pub mod cli;
pub mod config;
pub mod vm;

pub use crate::config::{ConfigError, VMConfig};
pub use crate::vm::{Instruction, NativeRegistry, Opcode, SnapshotError, VMError, VMState, VM};
