//! Instruction Set
//!
//! One method per opcode. Every method validates its preconditions in the
//! order it executes them: a check that fails part way through returns the
//! error with earlier stack and register writes still in place. The
//! dispatcher turns the error into a halt and never rolls anything back.
//!
//! Binary operators take `second OP top`, where `top` is the most recently
//! pushed cell. Comparisons store the negation of the named relation in
//! `cmp`. String operators pop the top cell first.

use std::io::ErrorKind;
use std::thread;

use crate::bytecode::opcode::OpCode;
use crate::error::{CellKind, VmError, VmResult};

use super::heap::StrBuf;
use super::io::Channels;
use super::value::{TaggedValue, Value};
use super::vm::Machine;

/// `itostr` output must stay below this many characters.
const MAX_ITOSTR_LEN: usize = 64;

impl Machine {
    pub(super) fn execute(&mut self, opcode: OpCode, io: &mut Channels<'_>) -> VmResult<()> {
        match opcode {
            OpCode::Nop => Ok(()),

            OpCode::Push => self.exec_push(),
            OpCode::Pop => self.exec_pop(io),
            OpCode::Read => self.exec_read(io),
            OpCode::Add => self.exec_binary(u64::wrapping_add),
            OpCode::Sub => self.exec_binary(u64::wrapping_sub),
            OpCode::Mul => self.exec_binary(u64::wrapping_mul),
            OpCode::Div => self.exec_divide(|second, top| second / top),
            OpCode::Mod => self.exec_divide(|second, top| second % top),
            OpCode::IToStr => self.exec_itostr(),

            OpCode::Jmp => self.exec_jump(true),
            OpCode::Lt => self.exec_compare(|second, top| second < top),
            OpCode::Gt => self.exec_compare(|second, top| second > top),
            OpCode::Eq => self.exec_compare(|second, top| second == top),
            OpCode::Jnz => {
                let taken = self.memory.cmp();
                self.exec_jump(taken)
            }
            OpCode::Jz => {
                let taken = !self.memory.cmp();
                self.exec_jump(taken)
            }

            OpCode::Inc => self.exec_in_place(|v| v.wrapping_add(1)),
            OpCode::Dec => self.exec_in_place(|v| v.wrapping_sub(1)),
            OpCode::Shl => self.exec_in_place(|v| v << 1),
            OpCode::Shr => self.exec_in_place(|v| v >> 1),

            OpCode::Cpy => self.exec_cpy(),
            OpCode::Swap => self.exec_swap(),

            OpCode::PushS => self.exec_pushs(),
            OpCode::PopS => self.exec_pops(io),
            OpCode::ReadS => self.exec_reads(io),
            OpCode::StrCat => self.exec_strcat(),
            OpCode::StrLen => self.exec_strlen(),
            OpCode::StrToI => self.exec_strtoi(),
            OpCode::StrCmp => self.exec_strcmp(),
            OpCode::InStr => self.exec_instr(),

            OpCode::WriteFile => self.exec_writefile(io),
            OpCode::ReadFile => self.exec_readfile(),

            OpCode::Halt => {
                self.memory.set_halt(true);
                Ok(())
            }
        }
    }

    // Ownership helpers

    /// Pop one cell and take ownership of the buffer it names.
    fn pop_string(&mut self) -> VmResult<StrBuf> {
        let cell = self.stack().pop()?;
        match cell.decode() {
            Value::String(id) => self.heap.take(id),
            Value::Integer(_) => Err(VmError::TypeMismatch { expected: CellKind::StringHandle }),
        }
    }

    /// Hand `buf` to the heap and push its handle.
    fn push_string(&mut self, buf: StrBuf) -> VmResult<()> {
        let id = self.heap.alloc(buf)?;
        self.stack().push(TaggedValue::handle(id))
    }

    fn advance_ip(&mut self, by: u64) {
        let ip = self.memory.ip();
        self.memory.set_ip(ip.wrapping_add(by));
    }

    // Integers

    fn exec_push(&mut self) -> VmResult<()> {
        self.stack().require_free()?;
        let value = self.memory.program_u64(self.memory.ip())?;
        self.stack().push(TaggedValue::integer(value))?;
        self.advance_ip(8);
        Ok(())
    }

    fn exec_pop(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        self.stack().require_ints(1)?;
        let value = self.stack().pop()?;
        io.print_line(format!("{:#x}", value.raw()).as_bytes())?;
        Ok(())
    }

    fn exec_read(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        self.stack().require_free()?;
        let value = io.read_u64().map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => VmError::MalformedInput("short read on input"),
            _ => VmError::Io(e),
        })?;
        self.stack().push(TaggedValue::integer(value))
    }

    fn exec_binary(&mut self, op: fn(u64, u64) -> u64) -> VmResult<()> {
        let mut stack = self.stack();
        stack.require_ints(2)?;
        let top = stack.peek(0)?.raw();
        let second = stack.peek(1)?.raw();
        stack.drop_cells(1);
        stack.poke(0, TaggedValue::from_raw(op(second, top)))?;
        stack.require_ints(1)
    }

    fn exec_divide(&mut self, op: fn(u64, u64) -> u64) -> VmResult<()> {
        let mut stack = self.stack();
        stack.require_ints(2)?;
        let top = stack.peek(0)?.raw();
        let second = stack.peek(1)?.raw();
        stack.drop_cells(1);
        if top == 0 {
            return Err(VmError::DivideByZero);
        }
        stack.poke(0, TaggedValue::from_raw(op(second, top)))?;
        stack.require_ints(1)
    }

    fn exec_itostr(&mut self) -> VmResult<()> {
        self.stack().require_ints(1)?;
        let value = self.stack().pop()?.raw();
        let text = (value as i64).to_string();
        if text.len() >= MAX_ITOSTR_LEN {
            return Err(VmError::MalformedInput("integer text too long"));
        }
        self.push_string(StrBuf::from_bytes(text.as_bytes()))
    }

    fn exec_in_place(&mut self, op: fn(u64) -> u64) -> VmResult<()> {
        let mut stack = self.stack();
        stack.require_ints(1)?;
        let value = stack.peek(0)?.raw();
        stack.poke(0, TaggedValue::from_raw(op(value)))?;
        stack.require_ints(1)
    }

    // Control flow

    /// Jump to the 16-bit target at `ip` when `taken`, else skip it.
    fn exec_jump(&mut self, taken: bool) -> VmResult<()> {
        if taken {
            let target = self.memory.program_u16(self.memory.ip())?;
            self.memory.set_ip(u64::from(target));
        } else {
            self.advance_ip(2);
        }
        Ok(())
    }

    fn exec_compare(&mut self, relation: fn(u64, u64) -> bool) -> VmResult<()> {
        let mut stack = self.stack();
        stack.require_ints(2)?;
        let top = stack.peek(0)?.raw();
        let second = stack.peek(1)?.raw();
        stack.drop_cells(2);
        self.memory.set_cmp(!relation(second, top));
        Ok(())
    }

    // Stack shuffling

    fn exec_cpy(&mut self) -> VmResult<()> {
        self.stack().require(1)?;
        self.stack().require_free()?;
        let top = self.stack().peek(0)?;
        let copy = match top.decode() {
            Value::String(id) => {
                let buf = self.heap.get(id)?.deep_copy();
                TaggedValue::handle(self.heap.alloc(buf)?)
            }
            Value::Integer(_) => top,
        };
        self.stack().push(copy)
    }

    /// Only `swap_check.required_cells()` cells are demanded. Under the
    /// faithful check a lone cell is exchanged with the word below the
    /// stack, which is the stack pointer.
    fn exec_swap(&mut self) -> VmResult<()> {
        let required = self.config.swap_check.required_cells();
        let mut stack = self.stack();
        stack.require(required)?;
        stack.swap_top()
    }

    // Strings

    fn exec_pushs(&mut self) -> VmResult<()> {
        self.stack().require_free()?;
        let len = u64::from(self.memory.program_byte(self.memory.ip())?);
        self.advance_ip(1);
        let start = self.memory.ip();
        if start.saturating_add(len) > u64::from(self.memory.prog_length()) {
            return Err(VmError::MalformedInput("string literal runs past program end"));
        }
        let literal = (0..len)
            .map(|i| self.memory.program_byte(start + i))
            .collect::<VmResult<Vec<u8>>>()?;
        self.push_string(StrBuf::from_bytes(&literal))?;
        self.advance_ip(len);
        Ok(())
    }

    fn exec_pops(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        self.stack().require(1)?;
        let buf = self.pop_string()?;
        io.print_line(buf.as_bytes())?;
        Ok(())
    }

    fn exec_reads(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        self.stack().require_free()?;
        let line = io.read_line(self.config.max_line_len - 1)?;
        let end = line.iter().position(|&b| b == 0).unwrap_or(line.len());
        let mut text = &line[..end];
        if text.len() <= 1 {
            return Err(VmError::MalformedInput("empty line"));
        }
        if let Some(stripped) = text.strip_suffix(b"\n") {
            text = stripped;
        }
        self.push_string(StrBuf::from_bytes(text))
    }

    fn exec_strcat(&mut self) -> VmResult<()> {
        self.stack().require(2)?;
        let first = self.pop_string()?;
        let second = self.pop_string()?;
        self.push_string(first.concat(second))
    }

    fn exec_strlen(&mut self) -> VmResult<()> {
        self.stack().require(1)?;
        let buf = self.pop_string()?;
        self.stack().push(TaggedValue::integer(buf.len() as u64))
    }

    fn exec_strtoi(&mut self) -> VmResult<()> {
        self.stack().require(1)?;
        let buf = self.pop_string()?;
        let value = parse_c_long(buf.as_bytes()) as u64;
        let mut stack = self.stack();
        stack.push(TaggedValue::from_raw(value))?;
        stack.require_ints(1)
    }

    fn exec_strcmp(&mut self) -> VmResult<()> {
        self.stack().require(2)?;
        let first = self.pop_string()?;
        let second = self.pop_string()?;
        self.memory.set_cmp(first != second);
        Ok(())
    }

    /// `cmp` is set when the second string does not occur in the top one.
    fn exec_instr(&mut self) -> VmResult<()> {
        self.stack().require(2)?;
        let haystack = self.pop_string()?;
        let needle = self.pop_string()?;
        self.memory.set_cmp(!haystack.contains(&needle));
        Ok(())
    }

    // Sandboxed files

    fn exec_writefile(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        self.stack().require(2)?;
        let filename = self.pop_string()?;
        let content = self.pop_string()?;
        let name = self.sandbox.name(filename.as_bytes())?;
        self.sandbox.write(&name, content.as_bytes())?;

        let delay = self.config.file_write_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        io.print_line(b"file written")?;
        Ok(())
    }

    fn exec_readfile(&mut self) -> VmResult<()> {
        self.stack().require(1)?;
        let filename = self.pop_string()?;
        let name = self.sandbox.name(filename.as_bytes())?;
        let content = self.sandbox.read(&name)?;
        self.push_string(StrBuf::from_bytes(&content))
    }
}

/// `atol`: leading whitespace, optional sign, decimal digits. Anything else
/// ends the number; no digits at all yields 0. Saturates at the i64 bounds.
pub fn parse_c_long(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    while let [first, tail @ ..] = rest {
        if matches!(*first, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c') {
            rest = tail;
        } else {
            break;
        }
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let mut magnitude: i64 = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(b - b'0');
        magnitude = if negative {
            magnitude.saturating_mul(10).saturating_sub(digit)
        } else {
            magnitude.saturating_mul(10).saturating_add(digit)
        };
    }
    magnitude
}
