//! Main Virtual Machine implementation
//!
//! This module brings together registers, memory, stack, flags and the
//! executor, and drives them with a fetch-execute loop indexed by the
//! program counter.
//!
//! Each iteration fetches `program[pc]`, dispatches it, and then either
//! advances `pc` by one or keeps the value a jump, call or return wrote.
//! The loop ends when `HLT` executes or `pc` runs past the last
//! instruction.

use log::{debug, warn};
use std::fmt;

use crate::config::{ConfigError, VMConfig};
use crate::vm::errors::VMError;
use crate::vm::execution::VMExecution;
use crate::vm::memory::VMMemory;
use crate::vm::natives::NativeRegistry;
use crate::vm::registers::Registers;
use crate::vm::stack::VMStack;
use crate::vm::types::{Control, Flags, Instruction, Opcode, StackSlot, StepOutcome};

/// The register virtual machine
pub struct VM {
    /// Register file
    pub registers: Registers,

    /// Byte-addressable memory
    pub memory: VMMemory,

    /// Tagged data/return stack
    pub stack: VMStack,

    /// Sign and carry flags
    pub flags: Flags,

    /// Output buffer and native callbacks
    pub executor: VMExecution,

    pub(crate) pc: u32,
    pub(crate) halted: bool,
    pub(crate) program: Vec<Instruction>,
    config: VMConfig,
}

impl VM {
    /// Create a VM with `register_count` registers and `memory_size` bytes
    pub fn new(register_count: usize, memory_size: usize) -> Self {
        Self::build(VMConfig::new(register_count, memory_size))
    }

    /// Create a VM from a validated configuration
    pub fn with_config(config: VMConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: VMConfig) -> Self {
        Self {
            registers: Registers::new(config.register_count),
            memory: VMMemory::new(config.memory_size),
            stack: VMStack::new(),
            flags: Flags::default(),
            executor: VMExecution::new(),
            pc: 0,
            halted: false,
            program: Vec::new(),
            config,
        }
    }

    /// Install a prepared native registry, replacing the current one
    pub fn with_natives(mut self, natives: NativeRegistry) -> Self {
        self.executor.natives = natives;
        self
    }

    pub fn config(&self) -> &VMConfig {
        &self.config
    }

    /// Register a host callback reachable through `CALLNATIVE key`
    pub fn define_native<F>(&mut self, key: u32, f: F)
    where
        F: FnMut(u32) + 'static,
    {
        self.executor.natives.register(key, f);
    }

    pub fn natives(&self) -> &NativeRegistry {
        self.executor.natives()
    }

    /// Copy `data` into memory at `offset`; the whole range must fit
    pub fn load_memory(&mut self, data: &[u8], offset: usize) -> Result<(), VMError> {
        self.memory.load(data, offset)
    }

    pub fn read_memory(&self, offset: usize, len: usize) -> Result<&[u8], VMError> {
        self.memory.read(offset, len)
    }

    pub fn get_register(&self, index: u32) -> Result<u32, VMError> {
        self.registers.get(index)
    }

    pub fn set_register(&mut self, index: u32, value: u32) -> Result<(), VMError> {
        self.registers.set(index, value)
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn memory_size(&self) -> usize {
        self.memory.size()
    }

    pub fn program_counter(&self) -> u32 {
        self.pc
    }

    pub fn set_program_counter(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Append an instruction to the program
    pub fn add_instruction(&mut self, opcode: Opcode, operands: &[u32]) {
        self.push_instruction(Instruction::new(opcode, operands.to_vec()));
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        if instruction.operands.len() < instruction.opcode.arity() {
            warn!(
                "Instruction {} at {} has fewer operands than {} expects",
                instruction,
                self.program.len(),
                instruction.opcode
            );
        }
        self.program.push(instruction);
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Stack slots in pop order
    pub fn get_stack(&self) -> Vec<StackSlot> {
        self.stack.iter_top_first().collect()
    }

    pub fn get_output(&self) -> &str {
        self.executor.get_output()
    }

    pub fn clear_output(&mut self) {
        self.executor.clear_output();
    }

    /// Run the program from the first instruction
    pub fn run(&mut self) -> Result<(), VMError> {
        self.pc = 0;
        self.resume()
    }

    /// Continue running from the current program counter
    ///
    /// Stops at `HLT` or when the program counter leaves the program.
    pub fn resume(&mut self) -> Result<(), VMError> {
        self.halted = false;
        let mut steps: u64 = 0;

        loop {
            if self.pc as usize >= self.program.len() {
                break;
            }
            if let Some(limit) = self.config.max_steps {
                if steps >= limit {
                    return Err(VMError::StepLimitExceeded { limit });
                }
            }

            match self.step()? {
                StepOutcome::Running => steps += 1,
                StepOutcome::Halted | StepOutcome::Finished => break,
            }
        }

        debug!("Execution stopped at pc={} (halted={})", self.pc, self.halted);
        Ok(())
    }

    /// Execute the instruction at the program counter
    pub fn step(&mut self) -> Result<StepOutcome, VMError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }
        let Some(instruction) = self.program.get(self.pc as usize).cloned() else {
            return Ok(StepOutcome::Finished);
        };

        debug!("{:04}: {}", self.pc, instruction);
        match self.execute(instruction.opcode, &instruction.operands)? {
            Control::Next => self.pc = self.pc.saturating_add(1),
            Control::Jump(_) => {}
            Control::Halt => {
                self.pc = self.pc.saturating_add(1);
                return Ok(StepOutcome::Halted);
            }
        }

        Ok(StepOutcome::Running)
    }

    /// Format registers, flags, stack and memory for display
    pub fn dump_state(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PC: {}{}", self.pc, if self.halted { " (halted)" } else { "" })?;
        writeln!(
            f,
            "Flags: sign={} carry={}",
            self.flags.sign, self.flags.carry
        )?;
        let regs: Vec<String> = self
            .registers
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, v)| format!("r{}={}", i, v))
            .collect();
        writeln!(f, "Registers: [{}]", regs.join(", "))?;
        writeln!(f, "{}", self.stack.format_stack())?;
        write!(f, "{}", self.memory)
    }
}

impl fmt::Debug for VM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VM")
            .field("pc", &self.pc)
            .field("halted", &self.halted)
            .field("flags", &self.flags)
            .field("registers", &self.registers)
            .field("stack", &self.stack)
            .field("program_len", &self.program.len())
            .field("natives", &self.executor.natives)
            .finish()
    }
}
