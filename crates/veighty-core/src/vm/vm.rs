//! Virtual Machine Core
//!
//! Defines the machine value and its run loop. One instance owns its memory,
//! string heap and sandbox; the host constructs it, loads a program and
//! drives it to a terminal state.

use std::io::{BufRead, Write};

use tracing::{debug, trace};

use crate::bytecode::opcode::OpCode;
use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::loader::ProgramImage;
use crate::sandbox::Sandbox;

use super::heap::{HandleId, StringHeap};
use super::io::Channels;
use super::memory::{Layout, MachineMemory};
use super::stack::Stack;
use super::value::TaggedValue;

/// Lifecycle of the run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted,
}

/// Why the loop stopped
#[derive(Debug)]
pub enum HaltReason {
    /// A `halt` instruction (or an undefined opcode) ran.
    HaltInstruction,
    /// An instruction failed a check; its partial effects remain.
    Fault(VmError),
    /// The instruction pointer reached the end of the program.
    EndOfProgram,
    /// The cycle ceiling was hit.
    CycleLimit,
    /// The machine was already halted when `run` was called.
    AlreadyHalted,
}

/// Outcome of one `run` call
#[derive(Debug)]
pub struct RunSummary {
    /// Instructions executed by this call
    pub cycles: u64,
    pub reason: HaltReason,
}

/// Veighty Virtual Machine
#[derive(Debug)]
pub struct Machine {
    pub(super) config: VmConfig,
    pub(super) memory: MachineMemory,
    pub(super) heap: StringHeap,
    pub(super) sandbox: Sandbox,
    state: MachineState,
    cycles: u64,
}

impl Machine {
    /// Allocate a zeroed machine.
    pub fn initialize(config: VmConfig) -> VmResult<Self> {
        config.validate()?;
        let layout = Layout::for_config(&config)?;
        Ok(Machine {
            memory: MachineMemory::new(layout),
            heap: StringHeap::new(config.max_live_strings),
            sandbox: Sandbox::new(&config),
            state: MachineState::Running,
            cycles: 0,
            config,
        })
    }

    /// Copy a program into the store and record its length.
    pub fn load_program(&mut self, image: &ProgramImage) -> VmResult<()> {
        let capacity = self.memory.layout().program_capacity;
        if image.len() >= capacity {
            return Err(VmError::ProgramTooLarge { len: image.len(), capacity });
        }
        for (offset, byte) in image.bytes().iter().enumerate() {
            self.memory.store_program_byte(offset as u64, *byte)?;
        }
        self.memory.set_prog_length(image.len() as u32);
        Ok(())
    }

    /// Drive the loop until it reaches a terminal state.
    pub fn run(&mut self, input: &mut dyn BufRead, output: &mut dyn Write) -> RunSummary {
        if self.state == MachineState::Halted {
            return RunSummary { cycles: 0, reason: HaltReason::AlreadyHalted };
        }

        let mut io = Channels::new(input, output);
        let mut cycles = 0;
        let reason = loop {
            if self.memory.halt() {
                break HaltReason::HaltInstruction;
            }
            if self.memory.ip() >= u64::from(self.memory.prog_length()) {
                break HaltReason::EndOfProgram;
            }
            if cycles >= self.config.cycle_limit {
                break HaltReason::CycleLimit;
            }

            cycles += 1;
            if let Err(fault) = self.step(&mut io) {
                debug!(%fault, ip = self.memory.ip(), sp = self.memory.sp(), "instruction failed; halting");
                self.memory.set_halt(true);
                break HaltReason::Fault(fault);
            }
        };

        self.cycles += cycles;
        self.state = MachineState::Halted;
        debug!(cycles, ?reason, "machine halted");
        RunSummary { cycles, reason }
    }

    /// Fetch, advance, dispatch.
    fn step(&mut self, io: &mut Channels<'_>) -> VmResult<()> {
        let ip = self.memory.ip();
        let byte = self.memory.program_byte(ip)?;
        self.memory.set_ip(ip.wrapping_add(1));

        let opcode = OpCode::from_u8(byte).unwrap_or(OpCode::Halt);
        trace!(
            op = opcode.mnemonic(),
            byte,
            ip,
            sp = self.memory.sp(),
            halt = self.memory.halt(),
            cmp = self.memory.cmp(),
            "executing"
        );
        self.execute(opcode, io)
    }

    pub(super) fn stack(&mut self) -> Stack<'_> {
        Stack::new(&mut self.memory)
    }

    // Inspection

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn ip(&self) -> u64 {
        self.memory.ip()
    }

    pub fn sp(&self) -> u64 {
        self.memory.sp()
    }

    pub fn cmp(&self) -> bool {
        self.memory.cmp()
    }

    pub fn is_halted(&self) -> bool {
        self.memory.halt()
    }

    pub fn prog_length(&self) -> u32 {
        self.memory.prog_length()
    }

    /// Instructions executed over the machine's lifetime
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn memory(&self) -> &MachineMemory {
        &self.memory
    }

    /// Raw cell at `index`, bounds permitting.
    pub fn cell(&self, index: u64) -> VmResult<TaggedValue> {
        Ok(TaggedValue::from_raw(self.memory.load_cell(index)?))
    }

    /// Cells `0..sp`, clipped to the stack region.
    pub fn stack_cells(&self) -> Vec<TaggedValue> {
        let live = self.memory.sp().min(self.memory.layout().stack_capacity);
        (0..live)
            .filter_map(|i| self.cell(i).ok())
            .collect()
    }

    pub fn peek_top(&self) -> VmResult<TaggedValue> {
        let sp = self.memory.sp();
        if sp == 0 {
            return Err(VmError::StackUnderflow { required: 1, available: 0 });
        }
        self.cell(sp - 1)
    }

    /// Contents of a live string buffer.
    pub fn string(&self, id: HandleId) -> Option<&[u8]> {
        self.heap.get(id).ok().map(|buf| buf.as_bytes())
    }

    pub fn live_strings(&self) -> usize {
        self.heap.live()
    }
}
