//! Program construction
//!
//! [`ProgramBuilder`] emits opcode streams from typed calls and resolves
//! jump labels. [`assemble`] drives the builder from text:
//!
//! ```text
//! loop:                 # labels end with a colon
//!     push 0x10         # integers are decimal or 0x-prefixed hex
//!     pushs "hi\n"      # strings take \n \t \\ \" \xNN escapes
//!     jnz loop
//!     halt
//! ```

use std::collections::HashMap;

use thiserror::Error;

use super::instruction::{Instruction, Operand};
use super::opcode::{OpCode, OperandKind};

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("string literal of {0} bytes exceeds 255")]
    LiteralTooLong(usize),

    #[error("undefined label `{0}`")]
    UndefinedLabel(String),

    #[error("label `{0}` defined twice")]
    DuplicateLabel(String),

    #[error("jump target {0:#x} does not fit in 16 bits")]
    TargetOutOfRange(usize),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Where a jump operand points before labels are resolved.
#[derive(Debug, Clone)]
enum Target {
    Label(String),
    Absolute(u16),
}

/// Typed program builder
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    bytes: Vec<u8>,
    labels: HashMap<String, usize>,
    fixups: Vec<(usize, String)>,
    error: Option<AsmError>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset, i.e. where the next instruction lands.
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    fn fail(&mut self, err: AsmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn emit(mut self, instruction: Instruction) -> Self {
        instruction.encode(&mut self.bytes);
        self
    }

    /// Any opcode, emitted bare. Operand bytes, if the opcode takes any,
    /// must follow via [`ProgramBuilder::raw`].
    pub fn op(self, opcode: OpCode) -> Self {
        self.emit(Instruction::new(opcode))
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn push(self, value: u64) -> Self {
        self.emit(Instruction::with_operand(OpCode::Push, Operand::Imm64(value)))
    }

    pub fn pushs(mut self, literal: &[u8]) -> Self {
        if literal.len() > u8::MAX as usize {
            self.fail(AsmError::LiteralTooLong(literal.len()));
            return self;
        }
        self.emit(Instruction::with_operand(
            OpCode::PushS,
            Operand::Literal(literal.to_vec()),
        ))
    }

    pub fn label(mut self, name: &str) -> Self {
        let offset = self.bytes.len();
        if self.labels.insert(name.to_string(), offset).is_some() {
            self.fail(AsmError::DuplicateLabel(name.to_string()));
        }
        self
    }

    fn branch(mut self, opcode: OpCode, target: Target) -> Self {
        self.bytes.push(opcode as u8);
        match target {
            Target::Absolute(t) => self.bytes.extend_from_slice(&t.to_le_bytes()),
            Target::Label(name) => {
                self.fixups.push((self.bytes.len(), name));
                self.bytes.extend_from_slice(&[0, 0]);
            }
        }
        self
    }

    pub fn jmp(self, label: &str) -> Self {
        self.branch(OpCode::Jmp, Target::Label(label.to_string()))
    }

    pub fn jnz(self, label: &str) -> Self {
        self.branch(OpCode::Jnz, Target::Label(label.to_string()))
    }

    pub fn jz(self, label: &str) -> Self {
        self.branch(OpCode::Jz, Target::Label(label.to_string()))
    }

    /// Branch with an absolute target instead of a label.
    pub fn branch_to(self, opcode: OpCode, target: u16) -> Self {
        self.branch(opcode, Target::Absolute(target))
    }

    pub fn halt(self) -> Self {
        self.op(OpCode::Halt)
    }

    /// Resolve labels and return the finished stream.
    pub fn build(mut self) -> Result<Vec<u8>, AsmError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for (at, name) in &self.fixups {
            let offset = *self
                .labels
                .get(name)
                .ok_or_else(|| AsmError::UndefinedLabel(name.clone()))?;
            let target = u16::try_from(offset).map_err(|_| AsmError::TargetOutOfRange(offset))?;
            self.bytes[*at..*at + 2].copy_from_slice(&target.to_le_bytes());
        }
        Ok(self.bytes)
    }
}

/// Assemble program text into bytecode.
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut builder = ProgramBuilder::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        let syntax = |message: String| AsmError::Syntax { line, message };

        let mut text = strip_comment(raw_line).trim();
        if let Some((head, tail)) = text.split_once(LABEL_SUFFIX) {
            let name = head.trim();
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                builder = builder.label(name);
                text = tail.trim();
            }
        }
        if text.is_empty() {
            continue;
        }

        let (mnemonic, operand) = match text.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest.trim()),
            None => (text, ""),
        };
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| syntax(format!("unknown instruction `{}`", mnemonic)))?;

        builder = match opcode.operand() {
            OperandKind::None => {
                if !operand.is_empty() {
                    return Err(syntax(format!("`{}` takes no operand", mnemonic)));
                }
                builder.op(opcode)
            }
            OperandKind::Imm64 => builder.push(parse_integer(operand).map_err(syntax)?),
            OperandKind::Target16 => {
                if operand.starts_with(|c: char| c.is_ascii_digit()) {
                    let value = parse_integer(operand).map_err(syntax)?;
                    let target = u16::try_from(value)
                        .map_err(|_| syntax(format!("jump target `{}` exceeds 16 bits", operand)))?;
                    builder.branch_to(opcode, target)
                } else if operand.is_empty() {
                    return Err(syntax(format!("`{}` needs a target", mnemonic)));
                } else {
                    builder.branch(opcode, Target::Label(operand.to_string()))
                }
            }
            OperandKind::Literal => builder.pushs(&parse_string(operand).map_err(syntax)?),
        };
    }

    builder.build()
}

/// Drop a trailing comment, ignoring comment characters inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            COMMENT_CHAR if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_integer(text: &str) -> Result<u64, String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|_| format!("invalid integer `{}`", text))?;
    Ok(if negative { magnitude.wrapping_neg() } else { magnitude })
}

fn parse_string(text: &str) -> Result<Vec<u8>, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found `{}`", text))?;

    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid escape `\\x{}`", hex))?;
                out.push(byte);
            }
            other => return Err(format!("invalid escape `\\{}`", other.unwrap_or(' '))),
        }
    }
    Ok(out)
}
