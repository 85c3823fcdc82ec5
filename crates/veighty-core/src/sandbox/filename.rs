//! Sandbox filenames
//!
//! The only access control on the sandbox is what a name may contain:
//! ASCII letters and digits, nothing else, bounded length.

use crate::error::{VmError, VmResult};

/// A filename that has passed validation and may be joined onto the
/// sandbox directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxName(String);

impl SandboxName {
    pub fn parse(raw: &[u8], max_len: usize) -> VmResult<Self> {
        if raw.len() > max_len || !raw.iter().all(u8::is_ascii_alphanumeric) {
            return Err(VmError::InvalidFilename);
        }
        // all bytes are ASCII at this point
        let name = String::from_utf8(raw.to_vec()).map_err(|_| VmError::InvalidFilename)?;
        Ok(SandboxName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
