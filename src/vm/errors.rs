//! Error types for VM operations
//!
//! This module defines the conditions that stop execution or reject a
//! snapshot. Silent no-ops (division by zero, popping an empty stack) and
//! logged faults (unknown opcode numbers, missing native keys) never reach
//! these types.

use thiserror::Error;

use crate::vm::types::Opcode;

/// Error variants that can occur during VM execution
#[derive(Debug, Error)]
pub enum VMError {
    /// A register index was outside the register file
    #[error("Register r{index} out of bounds (register file holds {size})")]
    RegisterOutOfBounds { index: u32, size: usize },

    /// A memory access touched bytes outside the memory region
    #[error("Memory access at {address} of {len} byte(s) out of bounds (memory size {size})")]
    MemoryOutOfBounds { address: usize, len: usize, size: usize },

    /// An instruction carried fewer operands than its opcode requires
    #[error("{opcode} expects operand #{index} but only {given} were supplied")]
    MissingOperand {
        opcode: Opcode,
        index: usize,
        given: usize,
    },

    /// The top of the stack held the wrong kind of slot
    #[error("{opcode} expected a {expected} slot on top of the stack")]
    StackSlotMismatch {
        opcode: Opcode,
        expected: &'static str,
    },

    /// The configured step budget ran out before the program finished
    #[error("Step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },

    /// Snapshot encoding or decoding failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// I/O error while reading or writing a state file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a snapshot can be rejected
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// The stream does not start with the snapshot magic
    #[error("Not a VM snapshot (bad magic)")]
    BadMagic,

    /// The snapshot was written by an unsupported format version
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    /// The snapshot was taken from a VM with a different shape
    #[error(
        "Snapshot shape {registers} registers / {memory} bytes does not match VM ({expected_registers} / {expected_memory})"
    )]
    ShapeMismatch {
        registers: u32,
        memory: u32,
        expected_registers: usize,
        expected_memory: usize,
    },

    /// An instruction carried an opcode number that does not exist
    #[error("Unknown opcode {0} in snapshot program")]
    UnknownOpcode(u32),

    /// A stack slot tag byte was not recognised
    #[error("Invalid stack slot tag {0}")]
    InvalidSlotTag(u8),

    /// A flag byte was neither 0 nor 1
    #[error("Invalid flag byte {0}")]
    InvalidFlag(u8),

    /// A count field cannot be represented on this platform
    #[error("Length field {0} is too large")]
    LengthOverflow(u64),

    /// The stream ended in the middle of a field
    #[error("Snapshot truncated: {0}")]
    Truncated(String),
}
