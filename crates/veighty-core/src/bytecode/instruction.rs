//! Bytecode Instruction Representation
//!
//! A decoded instruction with its operand, used by the assembler and the
//! disassembler. The run loop does not use this: it reads operands straight
//! from machine memory, which a running program may have rewritten.

use std::fmt;

use super::opcode::{OpCode, OperandKind};

/// Decoded operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Imm64(u64),
    Target(u16),
    Literal(Vec<u8>),
}

/// Decoded bytecode instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    /// Create an instruction with no operand
    pub fn new(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Create an instruction with a single operand
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// Bytes this instruction occupies, opcode included.
    pub fn encoded_len(&self) -> usize {
        1 + match &self.operand {
            Operand::None => 0,
            Operand::Imm64(_) => 8,
            Operand::Target(_) => 2,
            Operand::Literal(bytes) => 1 + bytes.len(),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match &self.operand {
            Operand::None => {}
            Operand::Imm64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Operand::Target(t) => out.extend_from_slice(&t.to_le_bytes()),
            Operand::Literal(bytes) => {
                out.push(bytes.len() as u8);
                out.extend_from_slice(bytes);
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Imm64(v) => write!(f, " {:#x}", v),
            Operand::Target(t) => write!(f, " {:#06x}", t),
            Operand::Literal(bytes) => write!(f, " \"{}\"", bytes.escape_ascii()),
        }
    }
}

/// One line of a linear-sweep disassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Instruction(Instruction),
    /// A byte past the opcode table; runs as `halt`.
    Undefined(u8),
    /// An opcode whose operand runs past the end of the input.
    Truncated(OpCode),
}

/// Decode one instruction at `offset`, returning it and its length.
pub fn decode_at(bytes: &[u8], offset: usize) -> Option<(Decoded, usize)> {
    let byte = *bytes.get(offset)?;
    let Some(opcode) = OpCode::from_u8(byte) else {
        return Some((Decoded::Undefined(byte), 1));
    };
    let rest = &bytes[offset + 1..];
    let truncated = Some((Decoded::Truncated(opcode), bytes.len() - offset));

    let operand = match opcode.operand() {
        OperandKind::None => Operand::None,
        OperandKind::Imm64 => match rest.get(..8) {
            Some(raw) => Operand::Imm64(u64::from_le_bytes(raw.try_into().ok()?)),
            None => return truncated,
        },
        OperandKind::Target16 => match rest.get(..2) {
            Some(raw) => Operand::Target(u16::from_le_bytes([raw[0], raw[1]])),
            None => return truncated,
        },
        OperandKind::Literal => {
            let Some(&len) = rest.first() else {
                return truncated;
            };
            match rest.get(1..1 + len as usize) {
                Some(raw) => Operand::Literal(raw.to_vec()),
                None => return truncated,
            }
        }
    };
    let instruction = Instruction::with_operand(opcode, operand);
    let len = instruction.encoded_len();
    Some((Decoded::Instruction(instruction), len))
}

/// Linear sweep over `bytes`, one `offset: text` line per instruction.
pub fn disassemble(bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;
    while let Some((decoded, len)) = decode_at(bytes, offset) {
        let text = match decoded {
            Decoded::Instruction(ins) => ins.to_string(),
            Decoded::Undefined(byte) => format!("halt ({:#04x})", byte),
            Decoded::Truncated(op) => format!("{} <truncated>", op.mnemonic()),
        };
        lines.push(format!("{:04x}: {}", offset, text));
        offset += len;
    }
    lines
}
