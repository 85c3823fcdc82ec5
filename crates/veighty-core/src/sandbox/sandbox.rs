//! Sandboxed File Access
//!
//! Flat files directly inside one directory. Every access goes through a
//! [`SandboxName`], so nothing can name a path outside the directory.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use super::filename::SandboxName;

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    max_filename_len: usize,
    max_file_size: usize,
}

impl Sandbox {
    pub fn new(config: &VmConfig) -> Self {
        Sandbox {
            root: config.sandbox_dir.clone(),
            max_filename_len: config.max_filename_len,
            max_file_size: config.max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the sandbox directory if it is missing (host-level operation).
    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn name(&self, raw: &[u8]) -> VmResult<SandboxName> {
        SandboxName::parse(raw, self.max_filename_len)
    }

    fn path(&self, name: &SandboxName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Create or truncate `name` and write at most `max_file_size` bytes of
    /// `content`. Writing nothing counts as a failure; the file is left
    /// created and empty.
    pub fn write(&self, name: &SandboxName, content: &[u8]) -> VmResult<usize> {
        let path = self.path(name);
        let mut file = File::create(&path)?;
        let len = content.len().min(self.max_file_size);
        if len == 0 {
            return Err(VmError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "nothing to write",
            )));
        }
        file.write_all(&content[..len])?;
        debug!(path = %path.display(), bytes = len, "sandbox file written");
        Ok(len)
    }

    /// Read at most `max_file_size` bytes of `name`.
    pub fn read(&self, name: &SandboxName) -> VmResult<Vec<u8>> {
        let path = self.path(name);
        let file = File::open(&path)?;
        let mut content = Vec::new();
        file.take(self.max_file_size as u64).read_to_end(&mut content)?;
        debug!(path = %path.display(), bytes = content.len(), "sandbox file read");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox(dir: &Path) -> Sandbox {
        let config = VmConfig {
            sandbox_dir: dir.to_path_buf(),
            ..VmConfig::default()
        };
        Sandbox::new(&config)
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sb = sandbox(dir.path());
        let name = sb.name(b"out1").expect("name");
        assert_eq!(sb.write(&name, b"hello").expect("write"), 5);
        assert_eq!(sb.read(&name).expect("read"), b"hello");
    }

    #[test]
    fn content_is_capped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sb = sandbox(dir.path());
        let name = sb.name(b"big").expect("name");
        let content = vec![b'x'; 5000];
        assert_eq!(sb.write(&name, &content).expect("write"), 4096);
        assert_eq!(sb.read(&name).expect("read").len(), 4096);
    }

    #[test]
    fn empty_content_fails_but_creates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sb = sandbox(dir.path());
        let name = sb.name(b"empty").expect("name");
        assert!(matches!(sb.write(&name, b""), Err(VmError::Io(_))));
        assert!(dir.path().join("empty").exists());
    }

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sb = sandbox(dir.path());
        let name = sb.name(b"nothere").expect("name");
        assert!(matches!(sb.read(&name), Err(VmError::Io(_))));
    }
}
