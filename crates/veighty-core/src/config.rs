//! Veighty Configuration
//!
//! Defines the fixed capacities and limits of one machine instance.
//! Configuration specifies constraints only; enforcement is handled by the VM.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{VmError, VmResult};

/// Jump operands are 16 bits wide, so no program can address more than this.
pub const MAX_PROGRAM_CAPACITY: usize = 1 << 16;

/// Upper bound on stack cells (8 MiB of cell words).
pub const MAX_STACK_CAPACITY: usize = 1 << 20;

/// How many cells `swap` demands before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapCheck {
    /// Only one cell is required. With a single cell on the stack the second
    /// operand is the word below the stack: the stack pointer register.
    #[default]
    Faithful,
    /// Two cells are required.
    Hardened,
}

impl SwapCheck {
    pub fn required_cells(self) -> u64 {
        match self {
            SwapCheck::Faithful => 1,
            SwapCheck::Hardened => 2,
        }
    }
}

/// VM Configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Number of stack cells
    pub stack_capacity: usize,

    /// Size of the program store in bytes
    pub program_capacity: usize,

    /// Maximum number of instructions executed per run
    pub cycle_limit: u64,

    /// Bytes written by `writefile` / read by `readfile`, at most
    pub max_file_size: usize,

    /// Longest accepted sandbox filename
    pub max_filename_len: usize,

    /// Line buffer size for `reads` (one byte is reserved for the terminator)
    pub max_line_len: usize,

    /// Live string buffers allowed before allocation fails
    pub max_live_strings: usize,

    /// Directory that confines `writefile` / `readfile`
    pub sandbox_dir: PathBuf,

    /// Pause after a successful `writefile`
    pub file_write_delay_ms: u64,

    pub swap_check: SwapCheck,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_capacity: 4096,
            program_capacity: 4096,
            cycle_limit: 4096,
            max_file_size: 4096,
            max_filename_len: 256,
            max_line_len: 4096,
            max_live_strings: 65536,
            sandbox_dir: PathBuf::from("data"),
            file_write_delay_ms: 1000,
            swap_check: SwapCheck::Faithful,
        }
    }
}

impl VmConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML; absent keys keep their defaults.
    pub fn from_toml_str(source: &str) -> VmResult<Self> {
        let config: VmConfig =
            toml::from_str(source).map_err(|e| VmError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> VmResult<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn file_write_delay(&self) -> Duration {
        Duration::from_millis(self.file_write_delay_ms)
    }

    /// Reject limits the machine cannot honour.
    pub fn validate(&self) -> VmResult<()> {
        if self.stack_capacity == 0 || self.stack_capacity > MAX_STACK_CAPACITY {
            return Err(VmError::InvalidConfig(format!(
                "stack_capacity must be within 1..={}",
                MAX_STACK_CAPACITY
            )));
        }
        if self.program_capacity == 0 || self.program_capacity > MAX_PROGRAM_CAPACITY {
            return Err(VmError::InvalidConfig(format!(
                "program_capacity must be within 1..={}",
                MAX_PROGRAM_CAPACITY
            )));
        }
        if self.max_line_len < 2 {
            return Err(VmError::InvalidConfig("max_line_len must be at least 2".into()));
        }
        Ok(())
    }
}
