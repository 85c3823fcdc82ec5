//! Shared helpers for the engine integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use veighty_core::{HaltReason, Machine, ProgramLoader, RunSummary, VmConfig, VmError};

/// Default limits, no write delay.
pub fn config() -> VmConfig {
    VmConfig {
        file_write_delay_ms: 0,
        ..VmConfig::new()
    }
}

pub fn config_in(dir: &Path) -> VmConfig {
    VmConfig {
        sandbox_dir: dir.to_path_buf(),
        ..config()
    }
}

pub struct Run {
    pub vm: Machine,
    pub summary: RunSummary,
    pub output: Vec<u8>,
}

impl Run {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn fault(&self) -> Option<&VmError> {
        match &self.summary.reason {
            HaltReason::Fault(err) => Some(err),
            _ => None,
        }
    }
}

pub fn run_with(config: VmConfig, program: &[u8], input: &[u8]) -> Run {
    let image = ProgramLoader::load(program, &config).expect("program should fit");
    let mut vm = Machine::initialize(config).expect("config should be valid");
    vm.load_program(&image).expect("load failed");
    let mut input = Cursor::new(input.to_vec());
    let mut output = Vec::new();
    let summary = vm.run(&mut input, &mut output);
    Run { vm, summary, output }
}

pub fn run(program: &[u8]) -> Run {
    run_with(config(), program, &[])
}

pub fn run_input(program: &[u8], input: &[u8]) -> Run {
    run_with(config(), program, input)
}
