pub mod assembler;
pub mod instruction;
pub mod opcode;

pub use assembler::{assemble, AsmError, ProgramBuilder};
pub use instruction::{disassemble, Instruction};
pub use opcode::{OpCode, OperandKind};
