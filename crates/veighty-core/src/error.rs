//! Veighty Error Types
//!
//! Defines every condition that stops the machine. None of these are
//! recoverable at the instruction level: the dispatcher records the error,
//! raises the halt flag and keeps whatever the instruction already mutated.

use std::io;

use thiserror::Error;

/// Which kind of cell an instruction expected to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    StringHandle,
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Integer => write!(f, "integer"),
            CellKind::StringHandle => write!(f, "string handle"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    // Stack discipline
    #[error("stack underflow: {required} cell(s) required, {available} available")]
    StackUnderflow { required: u64, available: u64 },

    #[error("stack full")]
    StackFull,

    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: CellKind },

    // Arithmetic
    #[error("division by zero")]
    DivideByZero,

    // Side channels and resources
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),

    #[error("invalid filename")]
    InvalidFilename,

    #[error("io failure: {0}")]
    Io(#[from] io::Error),

    #[error("allocation failure")]
    AllocationFailure,

    // Memory model
    #[error("memory fault at word address {0:#x}")]
    MemoryFault(u64),

    #[error("dangling string handle {0:#x}")]
    DanglingHandle(u64),

    // Loading and configuration
    #[error("program of {len} bytes does not fit a store of {capacity} bytes")]
    ProgramTooLarge { len: usize, capacity: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type VmResult<T> = Result<T, VmError>;
