//! Type definitions for the virtual machine
//!
//! This module contains the core data types used by the VM: the opcode set,
//! instructions, tagged stack slots, the flag register, and the control
//! signals passed between the dispatcher and the fetch-execute loop.
//!
//! Opcode numbers are part of the snapshot format. New opcodes go at the end.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation codes understood by the dispatcher
///
/// Discriminants follow declaration order and are written verbatim into
/// snapshots.
#[repr(u32)]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No effect
    Nop = 0,

    /// `LOAD dst, addr` reads one memory byte into a register
    Load,

    /// `STORE src, addr` writes the low byte of a register to memory
    Store,

    /// `ADD a, b, dst`
    Add,

    /// `SUB a, b, dst`
    Sub,

    /// `MUL a, b, dst`
    Mul,

    /// `DIV a, b, dst`, silent no-op when `r[b]` is zero
    Div,

    /// `JMP target`
    Jmp,

    /// `JZ reg, target`
    Jz,

    /// `JNZ reg, target`
    Jnz,

    /// `CALL target` pushes the return address and jumps
    Call,

    /// `RET` pops the return address into the program counter
    Ret,

    /// `PUSH reg`
    Push,

    /// `POP reg`
    Pop,

    /// `AND a, b, dst`
    And,

    /// `OR a, b, dst`
    Or,

    /// `XOR a, b, dst`
    Xor,

    /// `NOT src, dst`
    Not,

    /// `CMP a, b` sets the sign and carry flags
    Cmp,

    /// Stops the fetch-execute loop
    Hlt,

    /// `LEA dst, imm` loads an immediate
    Lea,

    /// `SHR a, amount, dst`, logical right shift
    Shr,

    /// `SHL a, amount, dst`
    Shl,

    /// `SAR a, amount, dst`, arithmetic right shift
    Sar,

    /// `SHRA a, amount, dst`, arithmetic left shift (same as SHL)
    Shra,

    /// `MOD a, b, dst`, silent no-op when `r[b]` is zero
    Mod,

    /// `NEG src, dst`, two's-complement negation
    Neg,

    /// `INC reg`
    Inc,

    /// `DEC reg`
    Dec,

    /// `JS target`, jump if sign is set
    Js,

    /// `JC target`, jump if carry is set
    Jc,

    /// `JNC target`
    Jnc,

    /// `JNS target`
    Jns,

    /// `TEST reg` sets the sign and carry flags from one register
    Test,

    /// `MOV src, dst`
    Mov,

    /// `LOG addr` emits the NUL-terminated string at `addr`
    Log,

    /// `CALLNATIVE key [, arg]` invokes a host callback
    CallNative,
}

impl Opcode {
    /// Every opcode in numeric order
    pub const ALL: [Opcode; 37] = [
        Opcode::Nop,
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Jmp,
        Opcode::Jz,
        Opcode::Jnz,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Push,
        Opcode::Pop,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Not,
        Opcode::Cmp,
        Opcode::Hlt,
        Opcode::Lea,
        Opcode::Shr,
        Opcode::Shl,
        Opcode::Sar,
        Opcode::Shra,
        Opcode::Mod,
        Opcode::Neg,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Js,
        Opcode::Jc,
        Opcode::Jnc,
        Opcode::Jns,
        Opcode::Test,
        Opcode::Mov,
        Opcode::Log,
        Opcode::CallNative,
    ];

    /// Look up an opcode by its numeric value
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Numeric value used in snapshots
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Minimum number of operands the dispatcher reads
    ///
    /// `CALLNATIVE` takes an optional second operand that defaults to zero.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Nop | Opcode::Ret | Opcode::Hlt => 0,
            Opcode::Jmp
            | Opcode::Call
            | Opcode::Push
            | Opcode::Pop
            | Opcode::Inc
            | Opcode::Dec
            | Opcode::Js
            | Opcode::Jc
            | Opcode::Jnc
            | Opcode::Jns
            | Opcode::Test
            | Opcode::Log
            | Opcode::CallNative => 1,
            Opcode::Load
            | Opcode::Store
            | Opcode::Jz
            | Opcode::Jnz
            | Opcode::Not
            | Opcode::Cmp
            | Opcode::Lea
            | Opcode::Neg
            | Opcode::Mov => 2,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shr
            | Opcode::Shl
            | Opcode::Sar
            | Opcode::Shra
            | Opcode::Mod => 3,
        }
    }

    /// Assembly-style name
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Jmp => "JMP",
            Opcode::Jz => "JZ",
            Opcode::Jnz => "JNZ",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Cmp => "CMP",
            Opcode::Hlt => "HLT",
            Opcode::Lea => "LEA",
            Opcode::Shr => "SHR",
            Opcode::Shl => "SHL",
            Opcode::Sar => "SAR",
            Opcode::Shra => "SHRA",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Js => "JS",
            Opcode::Jc => "JC",
            Opcode::Jnc => "JNC",
            Opcode::Jns => "JNS",
            Opcode::Test => "TEST",
            Opcode::Mov => "MOV",
            Opcode::Log => "LOG",
            Opcode::CallNative => "CALLNATIVE",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A single program instruction: an opcode and its operand words
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<u32>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<u32>) -> Self {
        Self { opcode, operands }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        Ok(())
    }
}

/// An entry on the execution stack
///
/// Data pushed by `PUSH` and return addresses pushed by `CALL` share one
/// stack but are tagged so neither can be consumed as the other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    Data(u32),
    Return(u32),
}

impl StackSlot {
    pub fn value(self) -> u32 {
        match self {
            StackSlot::Data(v) | StackSlot::Return(v) => v,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            StackSlot::Data(_) => "data",
            StackSlot::Return(_) => "return",
        }
    }
}

/// Condition flags written by `CMP` and `TEST`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub sign: bool,
    pub carry: bool,
}

/// What the fetch-execute loop should do after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Advance to the next instruction
    Next,

    /// Continue at the given instruction index
    Jump(u32),

    /// Stop the loop
    Halt,
}

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An instruction ran and the machine can continue
    Running,

    /// `HLT` was executed
    Halted,

    /// The program counter is past the end of the program
    Finished,
}
