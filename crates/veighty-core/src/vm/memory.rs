//! VM Memory Model
//!
//! The whole machine state lives in one flat, word-addressed block:
//!
//! ```text
//! word 0              instruction pointer
//! word 1              stack pointer
//! word 2 ..           stack cells
//! word program_base   program bytes, packed little-endian
//! word flags          bit 0 halt, bit 1 cmp, bits 32..64 program length
//! ```
//!
//! Stack and program addresses are computed with wrapping arithmetic, so an
//! index just below the stack lands on the registers and a read past the
//! program spills into the flags word. Anything outside the block faults.

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};

const IP_WORD: usize = 0;
const SP_WORD: usize = 1;
const STACK_BASE: usize = 2;

const HALT_BIT: u64 = 1 << 0;
const CMP_BIT: u64 = 1 << 1;
const LENGTH_SHIFT: u32 = 32;

/// Word offsets of each region, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub stack_capacity: u64,
    pub program_capacity: usize,
    pub program_base: usize,
    pub flags_word: usize,
    pub words: usize,
}

impl Layout {
    /// Region offsets for `config`, or `InvalidConfig` if the block would
    /// not be addressable.
    pub fn for_config(config: &VmConfig) -> VmResult<Self> {
        let overflow = || VmError::InvalidConfig("machine memory size overflows".into());
        let program_base = STACK_BASE
            .checked_add(config.stack_capacity)
            .ok_or_else(overflow)?;
        let program_words = config.program_capacity.div_ceil(8);
        let flags_word = program_base
            .checked_add(program_words)
            .ok_or_else(overflow)?;
        let words = flags_word.checked_add(1).ok_or_else(overflow)?;
        Ok(Layout {
            stack_capacity: config.stack_capacity as u64,
            program_capacity: config.program_capacity,
            program_base,
            flags_word,
            words,
        })
    }
}

/// Flat machine memory
#[derive(Debug, Clone)]
pub struct MachineMemory {
    words: Vec<u64>,
    layout: Layout,
}

impl MachineMemory {
    /// Zeroed memory for the given layout
    pub fn new(layout: Layout) -> Self {
        MachineMemory {
            words: vec![0; layout.words],
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn load_word(&self, addr: u64) -> VmResult<u64> {
        usize::try_from(addr)
            .ok()
            .and_then(|a| self.words.get(a))
            .copied()
            .ok_or(VmError::MemoryFault(addr))
    }

    pub fn store_word(&mut self, addr: u64, value: u64) -> VmResult<()> {
        let slot = usize::try_from(addr)
            .ok()
            .and_then(|a| self.words.get_mut(a))
            .ok_or(VmError::MemoryFault(addr))?;
        *slot = value;
        Ok(())
    }

    /// Word address of stack cell `index`, wrapping like unsigned pointer math.
    pub fn cell_addr(&self, index: u64) -> u64 {
        (STACK_BASE as u64).wrapping_add(index)
    }

    pub fn load_cell(&self, index: u64) -> VmResult<u64> {
        self.load_word(self.cell_addr(index))
    }

    pub fn store_cell(&mut self, index: u64, value: u64) -> VmResult<()> {
        self.store_word(self.cell_addr(index), value)
    }

    // Program bytes

    fn byte_addr(&self, offset: u64) -> VmResult<(u64, u32)> {
        let base = self.layout.program_base as u64 * 8;
        let addr = base
            .checked_add(offset)
            .ok_or(VmError::MemoryFault(u64::MAX))?;
        Ok((addr / 8, (addr % 8) as u32 * 8))
    }

    pub fn program_byte(&self, offset: u64) -> VmResult<u8> {
        let (word, shift) = self.byte_addr(offset)?;
        Ok((self.load_word(word)? >> shift) as u8)
    }

    pub fn store_program_byte(&mut self, offset: u64, byte: u8) -> VmResult<()> {
        let (word, shift) = self.byte_addr(offset)?;
        let old = self.load_word(word)?;
        let value = (old & !(0xFF << shift)) | ((byte as u64) << shift);
        self.store_word(word, value)
    }

    /// Little-endian operand of `N` bytes starting at `offset`.
    pub fn program_le<const N: usize>(&self, offset: u64) -> VmResult<[u8; N]> {
        let mut bytes = [0u8; N];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.program_byte(offset.wrapping_add(i as u64))?;
        }
        Ok(bytes)
    }

    pub fn program_u16(&self, offset: u64) -> VmResult<u16> {
        Ok(u16::from_le_bytes(self.program_le::<2>(offset)?))
    }

    pub fn program_u64(&self, offset: u64) -> VmResult<u64> {
        Ok(u64::from_le_bytes(self.program_le::<8>(offset)?))
    }

    // Registers

    pub fn ip(&self) -> u64 {
        self.words[IP_WORD]
    }

    pub fn set_ip(&mut self, ip: u64) {
        self.words[IP_WORD] = ip;
    }

    pub fn sp(&self) -> u64 {
        self.words[SP_WORD]
    }

    pub fn set_sp(&mut self, sp: u64) {
        self.words[SP_WORD] = sp;
    }

    fn flags(&self) -> u64 {
        self.words[self.layout.flags_word]
    }

    fn set_flag(&mut self, bit: u64, on: bool) {
        let word = &mut self.words[self.layout.flags_word];
        if on {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    pub fn halt(&self) -> bool {
        self.flags() & HALT_BIT != 0
    }

    pub fn set_halt(&mut self, halt: bool) {
        self.set_flag(HALT_BIT, halt);
    }

    pub fn cmp(&self) -> bool {
        self.flags() & CMP_BIT != 0
    }

    pub fn set_cmp(&mut self, cmp: bool) {
        self.set_flag(CMP_BIT, cmp);
    }

    pub fn prog_length(&self) -> u32 {
        (self.flags() >> LENGTH_SHIFT) as u32
    }

    pub fn set_prog_length(&mut self, len: u32) {
        let word = &mut self.words[self.layout.flags_word];
        *word = (*word & 0xFFFF_FFFF) | ((len as u64) << LENGTH_SHIFT);
    }
}
