//! VM memory region
//!
//! A fixed-size, byte-addressable array. Addresses are raw offsets with no
//! alignment. All access is bounds-checked; a violation is reported as
//! [`VMError::MemoryOutOfBounds`] and leaves memory unchanged.

use std::fmt;

use crate::vm::errors::VMError;

/// Byte-addressable memory for the virtual machine
#[derive(Debug, Clone, PartialEq)]
pub struct VMMemory {
    bytes: Vec<u8>,
}

impl VMMemory {
    /// Create a zeroed memory region of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    fn out_of_bounds(&self, address: usize, len: usize) -> VMError {
        VMError::MemoryOutOfBounds {
            address,
            len,
            size: self.bytes.len(),
        }
    }

    /// Read one byte
    pub fn read_byte(&self, address: usize) -> Result<u8, VMError> {
        self.bytes
            .get(address)
            .copied()
            .ok_or_else(|| self.out_of_bounds(address, 1))
    }

    /// Write one byte
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), VMError> {
        let err = self.out_of_bounds(address, 1);
        let slot = self.bytes.get_mut(address).ok_or(err)?;
        *slot = value;
        Ok(())
    }

    /// Copy `data` into memory starting at `offset`
    ///
    /// The whole range must fit; nothing is written otherwise.
    pub fn load(&mut self, data: &[u8], offset: usize) -> Result<(), VMError> {
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.out_of_bounds(offset, data.len()))?;
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8], VMError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| self.out_of_bounds(offset, len))
    }

    /// Read a NUL-terminated string starting at `address`
    ///
    /// Stops at the first NUL or at the end of memory. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn read_cstr(&self, address: usize) -> Result<String, VMError> {
        let tail = self
            .bytes
            .get(address..)
            .filter(|tail| !tail.is_empty())
            .ok_or_else(|| self.out_of_bounds(address, 1))?;
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the contents; the caller guarantees the length matches
    pub(crate) fn replace(&mut self, bytes: Vec<u8>) {
        debug_assert_eq!(bytes.len(), self.bytes.len());
        self.bytes = bytes;
    }

    /// Zero all memory
    pub fn clear(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Display for VMMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory ({} bytes):", self.bytes.len())?;
        for (row, chunk) in self.bytes.chunks(16).enumerate() {
            if chunk.iter().all(|b| *b == 0) {
                continue;
            }
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            writeln!(f, "  {:04x}: {}", row * 16, hex.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_read() {
        let mut memory = VMMemory::new(8);
        memory.load(&[1, 2, 3], 2).unwrap();
        assert_eq!(memory.read(2, 3).unwrap(), &[1, 2, 3]);
        assert_eq!(memory.read_byte(4).unwrap(), 3);
    }

    #[test]
    fn test_load_past_end_writes_nothing() {
        let mut memory = VMMemory::new(4);
        let result = memory.load(&[9, 9, 9], 2);
        assert!(matches!(
            result,
            Err(VMError::MemoryOutOfBounds { address: 2, len: 3, size: 4 })
        ));
        assert_eq!(memory.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_load_exactly_fills() {
        let mut memory = VMMemory::new(4);
        memory.load(&[1, 2, 3, 4], 0).unwrap();
        memory.load(&[], 4).unwrap();
        assert_eq!(memory.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_read_cstr() {
        let mut memory = VMMemory::new(32);
        memory.load(b"Hello, World!\0", 0).unwrap();
        assert_eq!(memory.read_cstr(0).unwrap(), "Hello, World!");
        assert_eq!(memory.read_cstr(7).unwrap(), "World!");
    }

    #[test]
    fn test_read_cstr_without_terminator_stops_at_end() {
        let mut memory = VMMemory::new(3);
        memory.load(b"abc", 0).unwrap();
        assert_eq!(memory.read_cstr(1).unwrap(), "bc");
        assert!(memory.read_cstr(3).is_err());
    }

    #[test]
    fn test_byte_bounds() {
        let mut memory = VMMemory::new(2);
        assert!(memory.write_byte(2, 1).is_err());
        assert!(memory.read_byte(usize::MAX).is_err());
        memory.write_byte(1, 0xAB).unwrap();
        assert_eq!(memory.read_byte(1).unwrap(), 0xAB);
    }
}
