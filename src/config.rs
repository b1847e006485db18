use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Registers in a default VM
pub const DEFAULT_REGISTER_COUNT: usize = 10;

/// Bytes of memory in a default VM
pub const DEFAULT_MEMORY_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Construction-time settings for a [`VM`](crate::vm::VM)
///
/// Register count and memory size are fixed for the VM's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VMConfig {
    pub register_count: usize,
    pub memory_size: usize,
    /// Upper bound on instructions executed by one `run`/`resume`
    pub max_steps: Option<u64>,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            register_count: DEFAULT_REGISTER_COUNT,
            memory_size: DEFAULT_MEMORY_SIZE,
            max_steps: None,
        }
    }
}

impl VMConfig {
    pub fn new(register_count: usize, memory_size: usize) -> Self {
        Self {
            register_count,
            memory_size,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: VMConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sizes must be non-zero and addressable by 32-bit operands
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.register_count == 0 {
            return Err(ConfigError::Invalid("register_count must be at least 1".into()));
        }
        if self.memory_size == 0 {
            return Err(ConfigError::Invalid("memory_size must be at least 1".into()));
        }
        if u32::try_from(self.register_count).is_err() || u32::try_from(self.memory_size).is_err() {
            return Err(ConfigError::Invalid(format!(
                "sizes must fit in 32 bits (registers {}, memory {})",
                self.register_count, self.memory_size
            )));
        }
        if self.max_steps == Some(0) {
            return Err(ConfigError::Invalid("max_steps must be positive when set".into()));
        }
        Ok(())
    }
}
