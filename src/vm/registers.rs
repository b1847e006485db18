use crate::vm::errors::VMError;

/// Fixed-size register file of 32-bit words
///
/// Every read and write is bounds-checked and reports
/// [`VMError::RegisterOutOfBounds`] on a bad index.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    regs: Vec<u32>,
}

impl Registers {
    /// Creates a register file with `count` zeroed registers.
    pub fn new(count: usize) -> Self {
        Self {
            regs: vec![0; count],
        }
    }

    pub fn get(&self, index: u32) -> Result<u32, VMError> {
        self.regs
            .get(index as usize)
            .copied()
            .ok_or(VMError::RegisterOutOfBounds {
                index,
                size: self.regs.len(),
            })
    }

    pub fn set(&mut self, index: u32, value: u32) -> Result<(), VMError> {
        let size = self.regs.len();
        let slot = self
            .regs
            .get_mut(index as usize)
            .ok_or(VMError::RegisterOutOfBounds { index, size })?;
        *slot = value;
        Ok(())
    }

    /// Applies `f` to register `index` in place.
    pub fn update(&mut self, index: u32, f: impl FnOnce(u32) -> u32) -> Result<(), VMError> {
        let value = self.get(index)?;
        self.set(index, f(value))
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.regs
    }

    /// Replaces every register; the caller guarantees the length matches.
    pub(crate) fn replace(&mut self, words: Vec<u32>) {
        debug_assert_eq!(words.len(), self.regs.len());
        self.regs = words;
    }

    pub fn clear(&mut self) {
        self.regs.iter_mut().for_each(|r| *r = 0);
    }
}
