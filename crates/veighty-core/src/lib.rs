//! Veighty Machinery - Core Library
//!
//! A tagged-stack bytecode machine. Public API surface for the engine.

pub mod error;
pub mod config;
pub mod bytecode;
pub mod vm;
pub mod loader;
pub mod sandbox;

// Re-export commonly used types
pub use error::{CellKind, VmError, VmResult};
pub use config::{SwapCheck, VmConfig};
pub use bytecode::opcode::OpCode;
pub use bytecode::assembler::{assemble, ProgramBuilder};
pub use vm::{HaltReason, Machine, MachineState, RunSummary, TaggedValue, Value};
pub use loader::{ProgramImage, ProgramLoader};
pub use sandbox::Sandbox;
