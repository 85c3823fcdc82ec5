//! Program Loader
//!
//! Programs are raw opcode streams with no header. Loading only checks that
//! the stream fits the program store; everything else is decided at run
//! time, byte by byte.

use std::fs;
use std::path::Path;

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};

/// A program accepted for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Bytecode loader
pub struct ProgramLoader;

impl ProgramLoader {
    /// Accept `bytes` if strictly shorter than the program store.
    pub fn load(bytes: &[u8], config: &VmConfig) -> VmResult<ProgramImage> {
        if bytes.len() >= config.program_capacity {
            return Err(VmError::ProgramTooLarge {
                len: bytes.len(),
                capacity: config.program_capacity,
            });
        }
        Ok(ProgramImage { bytes: bytes.to_vec() })
    }

    pub fn load_file(path: &Path, config: &VmConfig) -> VmResult<ProgramImage> {
        let bytes = fs::read(path)?;
        Self::load(&bytes, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_sized_program_rejected() {
        let config = VmConfig::default();
        assert!(ProgramLoader::load(&[0u8; 4095], &config).is_ok());
        assert!(matches!(
            ProgramLoader::load(&[0u8; 4096], &config),
            Err(VmError::ProgramTooLarge { len: 4096, capacity: 4096 })
        ));
    }

    #[test]
    fn empty_program_accepted() {
        let image = ProgramLoader::load(&[], &VmConfig::default()).expect("load");
        assert!(image.is_empty());
    }
}
