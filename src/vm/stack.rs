//! VM Stack operations
//!
//! One LIFO holds both data words and return addresses. Each entry is a
//! tagged [`StackSlot`], so a `POP` can never consume a return address and a
//! `RET` can never jump to a data word. Popping an empty stack is a no-op.

use crate::vm::errors::VMError;
use crate::vm::types::{Opcode, StackSlot};

/// Tagged execution stack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VMStack {
    /// Slots, bottom first
    slots: Vec<StackSlot>,
}

impl VMStack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Rebuild a stack from slots listed top first
    pub fn from_top_first(mut slots: Vec<StackSlot>) -> Self {
        slots.reverse();
        Self { slots }
    }

    pub fn push_data(&mut self, value: u32) {
        self.slots.push(StackSlot::Data(value));
    }

    pub fn push_return(&mut self, address: u32) {
        self.slots.push(StackSlot::Return(address));
    }

    /// Pop a data word
    ///
    /// Returns `Ok(None)` on an empty stack and `StackSlotMismatch` when the
    /// top slot is a return address (which is left in place).
    pub fn pop_data(&mut self, opcode: Opcode) -> Result<Option<u32>, VMError> {
        self.pop_tagged(opcode, "data", |slot| match slot {
            StackSlot::Data(v) => Some(v),
            StackSlot::Return(_) => None,
        })
    }

    /// Pop a return address, with the same empty/mismatch rules as `pop_data`
    pub fn pop_return(&mut self, opcode: Opcode) -> Result<Option<u32>, VMError> {
        self.pop_tagged(opcode, "return", |slot| match slot {
            StackSlot::Return(v) => Some(v),
            StackSlot::Data(_) => None,
        })
    }

    fn pop_tagged(
        &mut self,
        opcode: Opcode,
        expected: &'static str,
        accept: impl Fn(StackSlot) -> Option<u32>,
    ) -> Result<Option<u32>, VMError> {
        let Some(&top) = self.slots.last() else {
            return Ok(None);
        };
        match accept(top) {
            Some(value) => {
                self.slots.pop();
                Ok(Some(value))
            }
            None => Err(VMError::StackSlotMismatch { opcode, expected }),
        }
    }

    /// Return the top slot without popping it
    pub fn top(&self) -> Option<StackSlot> {
        self.slots.last().copied()
    }

    /// Slots in pop order (top first)
    pub fn iter_top_first(&self) -> impl Iterator<Item = StackSlot> + '_ {
        self.slots.iter().rev().copied()
    }

    /// Format the stack as a string for display
    pub fn format_stack(&self) -> String {
        if self.slots.is_empty() {
            return "Stack: []".to_string();
        }

        let items: Vec<String> = self
            .iter_top_first()
            .map(|slot| match slot {
                StackSlot::Data(v) => v.to_string(),
                StackSlot::Return(v) => format!("ret@{}", v),
            })
            .collect();
        format!("Stack: [{}]", items.join(", "))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
