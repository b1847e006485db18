//! VM Operation execution logic
//!
//! This module provides the opcode dispatcher and the executor-side state it
//! needs besides registers, memory and stack: the output buffer written by
//! `LOG` and the native registry used by `CALLNATIVE`.
//!
//! The dispatcher never advances the program counter for ordinary
//! instructions; it only writes it for control transfers and reports what
//! happened through [`Control`]. The fetch-execute loop in `vm.rs` does the
//! rest.

use log::{debug, error, info};

use crate::vm::errors::VMError;
use crate::vm::natives::NativeRegistry;
use crate::vm::types::{Control, Opcode};
use crate::vm::vm::VM;

/// Executor-side state: program output and host callbacks
#[derive(Debug, Default)]
pub struct VMExecution {
    /// Host callbacks reachable through `CALLNATIVE`
    pub(crate) natives: NativeRegistry,

    /// Output buffer, one line per `LOG`
    pub(crate) output: String,
}

impl VMExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_natives(natives: NativeRegistry) -> Self {
        Self {
            natives,
            output: String::new(),
        }
    }

    /// Emit a message to the output
    pub fn emit(&mut self, message: &str) {
        info!("{}", message);
        self.output.push_str(message);
        self.output.push('\n');
    }

    /// Invoke a native callback; a missing key is logged and ignored
    pub fn call_native(&mut self, key: u32, arg: u32) {
        if !self.natives.invoke(key, arg) {
            error!("Native function {} is not registered", key);
        }
    }

    pub fn get_output(&self) -> &str {
        &self.output
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }
}

/// Fetch operand `index`, failing if the instruction is too short
fn operand(opcode: Opcode, operands: &[u32], index: usize) -> Result<u32, VMError> {
    operands
        .get(index)
        .copied()
        .ok_or(VMError::MissingOperand {
            opcode,
            index,
            given: operands.len(),
        })
}

/// Two-register arithmetic and bitwise operations
///
/// Returns `None` for division or remainder by zero.
fn execute_arithmetic(opcode: Opcode, a: u32, b: u32) -> Option<u32> {
    match opcode {
        Opcode::Add => Some(a.wrapping_add(b)),
        Opcode::Sub => Some(a.wrapping_sub(b)),
        Opcode::Mul => Some(a.wrapping_mul(b)),
        Opcode::Div => a.checked_div(b),
        Opcode::Mod => a.checked_rem(b),
        Opcode::And => Some(a & b),
        Opcode::Or => Some(a | b),
        Opcode::Xor => Some(a ^ b),
        _ => unreachable!("{} is not an arithmetic opcode", opcode),
    }
}

/// Shifts by an immediate amount masked to 0..=31
fn execute_shift(opcode: Opcode, value: u32, amount: u32) -> u32 {
    let amount = amount & 0x1F;
    match opcode {
        Opcode::Shr => value >> amount,
        Opcode::Shl | Opcode::Shra => value << amount,
        Opcode::Sar => ((value as i32) >> amount) as u32,
        _ => unreachable!("{} is not a shift opcode", opcode),
    }
}

impl VM {
    /// Execute a single instruction against the machine state
    ///
    /// Jumps, calls and returns write the program counter directly and
    /// report [`Control::Jump`]; everything else leaves it alone. On error
    /// no state has been changed by the failing instruction.
    pub fn execute(&mut self, opcode: Opcode, operands: &[u32]) -> Result<Control, VMError> {
        let op = |index: usize| operand(opcode, operands, index);

        match opcode {
            Opcode::Nop => {}

            Opcode::Load => {
                let value = self.memory.read_byte(op(1)? as usize)?;
                self.registers.set(op(0)?, u32::from(value))?;
            }

            Opcode::Store => {
                let value = self.registers.get(op(0)?)?;
                self.memory.write_byte(op(1)? as usize, value as u8)?;
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor => {
                let a = self.registers.get(op(0)?)?;
                let b = self.registers.get(op(1)?)?;
                let dst = op(2)?;
                match execute_arithmetic(opcode, a, b) {
                    Some(result) => self.registers.set(dst, result)?,
                    None => {
                        // Bounds-check the destination even though it is not written.
                        self.registers.get(dst)?;
                        debug!("{} by zero ignored", opcode);
                    }
                }
            }

            Opcode::Shr | Opcode::Shl | Opcode::Sar | Opcode::Shra => {
                let value = self.registers.get(op(0)?)?;
                let result = execute_shift(opcode, value, op(1)?);
                self.registers.set(op(2)?, result)?;
            }

            Opcode::Not => {
                let value = self.registers.get(op(0)?)?;
                self.registers.set(op(1)?, !value)?;
            }

            Opcode::Neg => {
                let value = self.registers.get(op(0)?)?;
                self.registers.set(op(1)?, value.wrapping_neg())?;
            }

            Opcode::Inc => self.registers.update(op(0)?, |v| v.wrapping_add(1))?,

            Opcode::Dec => self.registers.update(op(0)?, |v| v.wrapping_sub(1))?,

            Opcode::Mov => {
                let value = self.registers.get(op(0)?)?;
                self.registers.set(op(1)?, value)?;
            }

            Opcode::Lea => self.registers.set(op(0)?, op(1)?)?,

            Opcode::Push => {
                let value = self.registers.get(op(0)?)?;
                self.stack.push_data(value);
            }

            Opcode::Pop => {
                let dst = op(0)?;
                self.registers.get(dst)?;
                match self.stack.pop_data(opcode)? {
                    Some(value) => self.registers.set(dst, value)?,
                    None => debug!("POP on empty stack ignored"),
                }
            }

            Opcode::Cmp => {
                let a = self.registers.get(op(0)?)?;
                let b = self.registers.get(op(1)?)?;
                self.flags.sign = (a as i32) < (b as i32);
                self.flags.carry = a >= b;
            }

            Opcode::Test => {
                let value = self.registers.get(op(0)?)?;
                self.flags.sign = (value as i32) < 0;
                self.flags.carry = value != 0;
            }

            Opcode::Jmp => return Ok(self.jump(op(0)?)),

            Opcode::Jz | Opcode::Jnz => {
                let value = self.registers.get(op(0)?)?;
                let target = op(1)?;
                if (value == 0) == (opcode == Opcode::Jz) {
                    return Ok(self.jump(target));
                }
            }

            Opcode::Js | Opcode::Jns | Opcode::Jc | Opcode::Jnc => {
                let target = op(0)?;
                let taken = match opcode {
                    Opcode::Js => self.flags.sign,
                    Opcode::Jns => !self.flags.sign,
                    Opcode::Jc => self.flags.carry,
                    _ => !self.flags.carry,
                };
                if taken {
                    return Ok(self.jump(target));
                }
            }

            Opcode::Call => {
                let target = op(0)?;
                self.stack.push_return(self.pc.saturating_add(1));
                return Ok(self.jump(target));
            }

            Opcode::Ret => match self.stack.pop_return(opcode)? {
                Some(address) => return Ok(self.jump(address)),
                None => debug!("RET on empty stack ignored"),
            },

            Opcode::Log => {
                let text = self.memory.read_cstr(op(0)? as usize)?;
                self.executor.emit(&text);
            }

            Opcode::CallNative => {
                let key = op(0)?;
                let arg = operands.get(1).copied().unwrap_or(0);
                self.executor.call_native(key, arg);
            }

            Opcode::Hlt => {
                self.halted = true;
                return Ok(Control::Halt);
            }
        }

        Ok(Control::Next)
    }

    /// Execute an instruction given its numeric opcode
    ///
    /// An unknown number is logged and has no effect.
    pub fn execute_raw(&mut self, code: u32, operands: &[u32]) -> Result<Control, VMError> {
        match Opcode::from_u32(code) {
            Some(opcode) => self.execute(opcode, operands),
            None => {
                error!("Unknown opcode {}", code);
                Ok(Control::Next)
            }
        }
    }

    fn jump(&mut self, target: u32) -> Control {
        self.pc = target;
        Control::Jump(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(execute_arithmetic(Opcode::Add, u32::MAX, 2), Some(1));
        assert_eq!(execute_arithmetic(Opcode::Sub, 0, 1), Some(u32::MAX));
        assert_eq!(execute_arithmetic(Opcode::Mul, 0x8000_0000, 2), Some(0));
        assert_eq!(execute_arithmetic(Opcode::Div, 10, 0), None);
        assert_eq!(execute_arithmetic(Opcode::Mod, 10, 0), None);
        assert_eq!(execute_arithmetic(Opcode::Mod, 10, 4), Some(2));
    }

    #[test]
    fn test_shift_masks_amount() {
        assert_eq!(execute_shift(Opcode::Shl, 1, 33), 2);
        assert_eq!(execute_shift(Opcode::Shr, 0x8000_0000, 31), 1);
        assert_eq!(execute_shift(Opcode::Sar, 0x8000_0000, 31), u32::MAX);
        assert_eq!(execute_shift(Opcode::Shra, 3, 2), 12);
    }

    #[test]
    fn test_missing_operand() {
        let mut vm = VM::new(4, 16);
        let result = vm.execute(Opcode::Add, &[0, 1]);
        assert!(matches!(
            result,
            Err(VMError::MissingOperand { opcode: Opcode::Add, index: 2, given: 2 })
        ));
    }

    #[test]
    fn test_unknown_raw_opcode_is_ignored() {
        let mut vm = VM::new(2, 4);
        vm.set_register(0, 5).unwrap();
        assert_eq!(vm.execute_raw(999, &[0, 0, 0]).unwrap(), Control::Next);
        assert_eq!(vm.get_register(0).unwrap(), 5);
        assert_eq!(vm.execute_raw(Opcode::Inc.as_u32(), &[0]).unwrap(), Control::Next);
        assert_eq!(vm.get_register(0).unwrap(), 6);
    }

    #[test]
    fn test_callnative_missing_key_continues() {
        let mut vm = VM::new(2, 4);
        assert_eq!(vm.execute(Opcode::CallNative, &[5, 1]).unwrap(), Control::Next);
    }
}
