//! Interactive session
//!
//! The conversation a connected client has with the machine: banner, a
//! decimal length line, that many raw program bytes, then the program runs
//! with the rest of the same input stream as its own input.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use veighty_core::vm::instructions::parse_c_long;
use veighty_core::vm::io::Channels;
use veighty_core::{Machine, ProgramLoader, RunSummary, Sandbox, VmConfig, VmError};

const BANNER: &str = r#"Go program your
                  __
                 /  \
           .-.  |    |
   *    _.-'  \  \__/
    \.-'       \
   /          _/
  |      _  /"
  |     /_\'
   \    \_/
    """""#;

const GREETING: &str = "Give me your bytecode!";
const LOADING: &str = "I will load the cannon and execute it.";
const LENGTH_PROMPT: &str = "Length:";
const BYTECODE_PROMPT: &str = "Bytecode:";

/// Fatal session errors. The display text is what the process reports on
/// stderr before exiting with status 1.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fgets")]
    MissingLength,

    #[error("invalid prog_length")]
    InvalidLength(u32),

    #[error("Failed to read input")]
    ShortProgram { expected: u32 },

    #[error("invalid harness config: {0}")]
    Config(String),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Harness settings; the machine's own limits live in the `[vm]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Wall-clock budget for the whole session; 0 disables the watchdog
    pub timeout_secs: u64,

    /// Pause after each banner line
    pub prompt_delay_ms: u64,

    /// Size of the length line buffer, terminator included
    pub length_line_max: usize,

    pub vm: VmConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            timeout_secs: 45,
            prompt_delay_ms: 1000,
            length_line_max: 100,
            vm: VmConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, HarnessError> {
        let config: HarnessConfig =
            toml::from_str(source).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.length_line_max < 2 {
            return Err(HarnessError::Config("length_line_max must be at least 2".into()));
        }
        self.vm.validate()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn prompt_delay(&self) -> Duration {
        Duration::from_millis(self.prompt_delay_ms)
    }
}

/// What a completed session leaves behind.
#[derive(Debug)]
pub struct SessionOutcome {
    pub prog_length: u32,
    pub summary: RunSummary,
    pub machine: Machine,
}

/// One client session
pub struct Session {
    config: HarnessConfig,
}

impl Session {
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Session { config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the full exchange on `input` / `output`.
    pub fn serve(
        &self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<SessionOutcome, HarnessError> {
        Sandbox::new(&self.config.vm).ensure_root()?;

        let prog_length = {
            let mut io = Channels::new(&mut *input, &mut *output);
            self.greet(&mut io)?;
            io.print_line(LENGTH_PROMPT.as_bytes())?;
            let line = io.read_line(self.config.length_line_max - 1)?;
            if line.is_empty() {
                return Err(HarnessError::MissingLength);
            }
            parse_length(&line)
        };
        debug!(prog_length, "length received");

        let capacity = self.config.vm.program_capacity;
        if prog_length as usize >= capacity {
            return Err(HarnessError::InvalidLength(prog_length));
        }

        writeln!(output, "{}", BYTECODE_PROMPT)?;
        output.flush()?;
        let mut bytes = vec![0u8; prog_length as usize];
        input.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => HarnessError::ShortProgram { expected: prog_length },
            _ => HarnessError::Io(e),
        })?;

        let image = ProgramLoader::load(&bytes, &self.config.vm)?;
        let mut machine = Machine::initialize(self.config.vm.clone())?;
        machine.load_program(&image)?;
        let summary = machine.run(input, output);
        info!(prog_length, cycles = summary.cycles, reason = ?summary.reason, "session finished");

        Ok(SessionOutcome { prog_length, summary, machine })
    }

    fn greet(&self, io: &mut Channels<'_>) -> io::Result<()> {
        for line in [BANNER, GREETING, LOADING] {
            io.print_line(line.as_bytes())?;
            self.pause();
        }
        Ok(())
    }

    fn pause(&self) {
        let delay = self.config.prompt_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// `atoi` into an unsigned length: a negative count wraps to a huge one.
fn parse_length(line: &[u8]) -> u32 {
    parse_c_long(line) as i32 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_follows_atoi() {
        assert_eq!(parse_length(b"20\n"), 20);
        assert_eq!(parse_length(b"  7 bytes\n"), 7);
        assert_eq!(parse_length(b"abc\n"), 0);
        assert_eq!(parse_length(b"-1\n"), u32::MAX);
    }

    #[test]
    fn toml_overrides_nested_vm_table() {
        let config = HarnessConfig::from_toml_str(
            r#"
            timeout_secs = 0
            prompt_delay_ms = 0

            [vm]
            swap_check = "hardened"
            sandbox_dir = "/tmp/box"
            "#,
        )
        .expect("parse");
        assert_eq!(config.timeout(), None);
        assert_eq!(config.length_line_max, 100);
        assert_eq!(config.vm.swap_check, veighty_core::SwapCheck::Hardened);
        assert_eq!(config.vm.stack_capacity, 4096);
    }

    #[test]
    fn zero_program_capacity_rejected() {
        let res = HarnessConfig::from_toml_str("[vm]\nprogram_capacity = 0\n");
        assert!(matches!(res, Err(HarnessError::Vm(VmError::InvalidConfig(_)))));
    }
}
