//! Native function registry
//!
//! Hosts register unary callbacks under a numeric key before running a
//! program; `CALLNATIVE key, arg` looks the key up and invokes the callback.
//! The registry never inspects what a callback does.

use std::collections::HashMap;
use std::fmt;

/// A host callback taking one 32-bit argument
pub type NativeFn = Box<dyn FnMut(u32)>;

/// Table of host callbacks keyed by number
#[derive(Default)]
pub struct NativeRegistry {
    functions: HashMap<u32, NativeFn>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register `f` under `key`, replacing any previous callback
    pub fn register<F>(&mut self, key: u32, f: F)
    where
        F: FnMut(u32) + 'static,
    {
        if self.functions.insert(key, Box::new(f)).is_some() {
            log::debug!("Replaced native function {}", key);
        }
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with<F>(mut self, key: u32, f: F) -> Self
    where
        F: FnMut(u32) + 'static,
    {
        self.register(key, f);
        self
    }

    /// Invoke the callback under `key`; returns false when none is registered
    pub fn invoke(&mut self, key: u32, arg: u32) -> bool {
        match self.functions.get_mut(&key) {
            Some(f) => {
                f(arg);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: u32) -> bool {
        self.functions.contains_key(&key)
    }

    /// Registered keys in ascending order
    pub fn keys(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.functions.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
