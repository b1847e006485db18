//! Binary state snapshots
//!
//! A snapshot captures registers, memory, the tagged stack, the program
//! counter, flags and the full program. All integers are little-endian.
//!
//! ```text
//! magic      "RGVM"
//! version    u16
//! registers  u32 count, memory u32 size
//! words      u32 * registers
//! bytes      u8  * memory
//! stack      u64 count, then (u8 tag, u32 value) top first
//! pc         u32
//! sign       u8, carry u8, halted u8
//! program    u64 count, then (u32 opcode, u64 operand count, u32 * operands)
//! ```
//!
//! Decoding builds a complete [`VMState`] before anything in the VM is
//! touched, so a rejected or unreadable snapshot leaves the VM as it was.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::vm::errors::{SnapshotError, VMError};
use crate::vm::stack::VMStack;
use crate::vm::types::{Flags, Instruction, Opcode, StackSlot};
use crate::vm::vm::VM;

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"RGVM";
pub const SNAPSHOT_VERSION: u16 = 1;

const TAG_DATA: u8 = 0;
const TAG_RETURN: u8 = 1;

/// Owned copy of the full machine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VMState {
    pub registers: Vec<u32>,
    pub memory: Vec<u8>,
    /// Stack slots, top first
    pub stack: Vec<StackSlot>,
    pub pc: u32,
    pub flags: Flags,
    pub halted: bool,
    pub program: Vec<Instruction>,
}

fn truncated(field: &str) -> impl Fn(io::Error) -> VMError + '_ {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SnapshotError::Truncated(field.to_string()).into()
        } else {
            VMError::Io(err)
        }
    }
}

fn read_len<R: Read>(reader: &mut R, field: &str) -> Result<usize, VMError> {
    let len = reader.read_u64::<LittleEndian>().map_err(truncated(field))?;
    usize::try_from(len).map_err(|_| SnapshotError::LengthOverflow(len).into())
}

fn read_bool<R: Read>(reader: &mut R, field: &str) -> Result<bool, VMError> {
    match reader.read_u8().map_err(truncated(field))? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SnapshotError::InvalidFlag(other).into()),
    }
}

fn size_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "size exceeds 32 bits"))
}

impl VMState {
    /// Write the state in snapshot format
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), VMError> {
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_u16::<LittleEndian>(SNAPSHOT_VERSION)?;
        writer.write_u32::<LittleEndian>(size_u32(self.registers.len())?)?;
        writer.write_u32::<LittleEndian>(size_u32(self.memory.len())?)?;

        for word in &self.registers {
            writer.write_u32::<LittleEndian>(*word)?;
        }
        writer.write_all(&self.memory)?;

        writer.write_u64::<LittleEndian>(self.stack.len() as u64)?;
        for slot in &self.stack {
            let tag = match slot {
                StackSlot::Data(_) => TAG_DATA,
                StackSlot::Return(_) => TAG_RETURN,
            };
            writer.write_u8(tag)?;
            writer.write_u32::<LittleEndian>(slot.value())?;
        }

        writer.write_u32::<LittleEndian>(self.pc)?;
        writer.write_u8(self.flags.sign as u8)?;
        writer.write_u8(self.flags.carry as u8)?;
        writer.write_u8(self.halted as u8)?;

        writer.write_u64::<LittleEndian>(self.program.len() as u64)?;
        for instruction in &self.program {
            writer.write_u32::<LittleEndian>(instruction.opcode.as_u32())?;
            writer.write_u64::<LittleEndian>(instruction.operands.len() as u64)?;
            for operand in &instruction.operands {
                writer.write_u32::<LittleEndian>(*operand)?;
            }
        }

        Ok(())
    }

    /// Read a state in snapshot format
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, VMError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated("magic"))?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic.into());
        }
        let version = reader.read_u16::<LittleEndian>().map_err(truncated("version"))?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version).into());
        }

        let register_count = reader.read_u32::<LittleEndian>().map_err(truncated("register count"))?;
        let memory_size = reader.read_u32::<LittleEndian>().map_err(truncated("memory size"))?;

        let mut registers = Vec::new();
        for _ in 0..register_count {
            registers.push(reader.read_u32::<LittleEndian>().map_err(truncated("registers"))?);
        }

        let mut memory = Vec::new();
        reader
            .by_ref()
            .take(u64::from(memory_size))
            .read_to_end(&mut memory)?;
        if memory.len() != memory_size as usize {
            return Err(SnapshotError::Truncated("memory".to_string()).into());
        }

        let stack_len = read_len(reader, "stack count")?;
        let mut stack = Vec::new();
        for _ in 0..stack_len {
            let tag = reader.read_u8().map_err(truncated("stack"))?;
            let value = reader.read_u32::<LittleEndian>().map_err(truncated("stack"))?;
            stack.push(match tag {
                TAG_DATA => StackSlot::Data(value),
                TAG_RETURN => StackSlot::Return(value),
                other => return Err(SnapshotError::InvalidSlotTag(other).into()),
            });
        }

        let pc = reader.read_u32::<LittleEndian>().map_err(truncated("program counter"))?;
        let sign = read_bool(reader, "sign flag")?;
        let carry = read_bool(reader, "carry flag")?;
        let halted = read_bool(reader, "halted flag")?;

        let program_len = read_len(reader, "instruction count")?;
        let mut program = Vec::new();
        for _ in 0..program_len {
            let raw = reader.read_u32::<LittleEndian>().map_err(truncated("opcode"))?;
            let opcode = Opcode::from_u32(raw).ok_or(SnapshotError::UnknownOpcode(raw))?;
            let operand_count = read_len(reader, "operand count")?;
            let mut operands = Vec::new();
            for _ in 0..operand_count {
                operands.push(reader.read_u32::<LittleEndian>().map_err(truncated("operands"))?);
            }
            program.push(Instruction::new(opcode, operands));
        }

        Ok(Self {
            registers,
            memory,
            stack,
            pc,
            flags: Flags { sign, carry },
            halted,
            program,
        })
    }

    /// Read and decode a snapshot file under a shared lock
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let file = File::open(path.as_ref())?;
        file.lock_shared()?;
        let mut reader = BufReader::new(&file);
        let state = Self::decode(&mut reader);
        file.unlock()?;
        state
    }
}

impl VM {
    /// Copy the full machine state
    pub fn snapshot(&self) -> VMState {
        VMState {
            registers: self.registers.as_slice().to_vec(),
            memory: self.memory.as_slice().to_vec(),
            stack: self.stack.iter_top_first().collect(),
            pc: self.pc,
            flags: self.flags,
            halted: self.halted,
            program: self.program.clone(),
        }
    }

    /// Replace the full machine state
    ///
    /// The state must have the same register count and memory size as this
    /// VM. Native callbacks and the output buffer are kept.
    pub fn restore(&mut self, state: VMState) -> Result<(), VMError> {
        if state.registers.len() != self.registers.len() || state.memory.len() != self.memory.size() {
            return Err(SnapshotError::ShapeMismatch {
                registers: state.registers.len() as u32,
                memory: state.memory.len() as u32,
                expected_registers: self.registers.len(),
                expected_memory: self.memory.size(),
            }
            .into());
        }

        self.registers.replace(state.registers);
        self.memory.replace(state.memory);
        self.stack = VMStack::from_top_first(state.stack);
        self.pc = state.pc;
        self.flags = state.flags;
        self.halted = state.halted;
        self.program = state.program;
        debug!(
            "Restored state: pc={}, {} instructions, {} stack slots",
            self.pc,
            self.program.len(),
            self.stack.len()
        );
        Ok(())
    }

    /// Write a snapshot to any writer
    pub fn save_state<W: Write>(&self, writer: &mut W) -> Result<(), VMError> {
        self.snapshot().encode(writer)
    }

    /// Read a snapshot from any reader and restore it without running
    pub fn load_state<R: Read>(&mut self, reader: &mut R) -> Result<(), VMError> {
        let state = VMState::decode(reader)?;
        self.restore(state)
    }

    /// Write a snapshot file, holding an exclusive lock while writing
    pub fn save_state_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), VMError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.lock_exclusive()?;

        let mut writer = BufWriter::new(&file);
        let result = self.save_state(&mut writer).and_then(|_| Ok(writer.flush()?));
        drop(writer);
        file.unlock()?;
        result?;

        info!("Saved VM state to {}", path.display());
        Ok(())
    }

    /// Restore a snapshot file without running it
    pub fn load_state_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), VMError> {
        let path = path.as_ref();
        let state = VMState::read_from_file(path)?;
        self.restore(state)?;
        info!("Loaded VM state from {}", path.display());
        Ok(())
    }

    /// Restore a snapshot file and immediately run its program from the start
    pub fn restore_and_run<P: AsRef<Path>>(&mut self, path: P) -> Result<(), VMError> {
        self.load_state_from_file(path)?;
        self.run()
    }
}
