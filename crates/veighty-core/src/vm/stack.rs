//! VM Stack Operations
//!
//! A borrowed view over the stack region of [`MachineMemory`]. Checks and
//! moves are separate calls so each instruction can interleave them in its
//! own order; a failing check after a move leaves the move in place.

use crate::error::{CellKind, VmError, VmResult};
use super::memory::MachineMemory;
use super::value::TaggedValue;

pub struct Stack<'m> {
    mem: &'m mut MachineMemory,
}

impl<'m> Stack<'m> {
    pub fn new(mem: &'m mut MachineMemory) -> Self {
        Stack { mem }
    }

    pub fn sp(&self) -> u64 {
        self.mem.sp()
    }

    /// At least `n` cells are live.
    pub fn require(&self, n: u64) -> VmResult<()> {
        let sp = self.mem.sp();
        if sp < n {
            return Err(VmError::StackUnderflow { required: n, available: sp });
        }
        Ok(())
    }

    /// The stack pointer is not sitting exactly at capacity.
    pub fn require_free(&self) -> VmResult<()> {
        if self.mem.sp() == self.mem.layout().stack_capacity {
            return Err(VmError::StackFull);
        }
        Ok(())
    }

    /// At least `n` cells are live and the top `n` are integers.
    pub fn require_ints(&self, n: u64) -> VmResult<()> {
        self.require(n)?;
        for i in 0..n {
            if self.peek(i)?.is_handle() {
                return Err(VmError::TypeMismatch { expected: CellKind::Integer });
            }
        }
        Ok(())
    }

    /// Cell `depth` positions below the top (0 = top).
    pub fn peek(&self, depth: u64) -> VmResult<TaggedValue> {
        let index = self.mem.sp().wrapping_sub(depth).wrapping_sub(1);
        Ok(TaggedValue::from_raw(self.mem.load_cell(index)?))
    }

    pub fn poke(&mut self, depth: u64, value: TaggedValue) -> VmResult<()> {
        let index = self.mem.sp().wrapping_sub(depth).wrapping_sub(1);
        self.mem.store_cell(index, value.raw())
    }

    /// Write at `sp` then advance it. No capacity check.
    pub fn push(&mut self, value: TaggedValue) -> VmResult<()> {
        let sp = self.mem.sp();
        self.mem.store_cell(sp, value.raw())?;
        self.mem.set_sp(sp.wrapping_add(1));
        Ok(())
    }

    /// Retreat `sp` then read the cell it now points at. No arity check.
    pub fn pop(&mut self) -> VmResult<TaggedValue> {
        self.drop_cells(1);
        Ok(TaggedValue::from_raw(self.mem.load_cell(self.mem.sp())?))
    }

    /// Retreat `sp` by `n` without reading.
    pub fn drop_cells(&mut self, n: u64) {
        let sp = self.mem.sp();
        self.mem.set_sp(sp.wrapping_sub(n));
    }

    /// Exchange the top cell with the one below it.
    pub fn swap_top(&mut self) -> VmResult<()> {
        let top = self.peek(0)?;
        let below = self.peek(1)?;
        self.poke(0, below)?;
        self.poke(1, top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::vm::memory::Layout;

    fn memory() -> MachineMemory {
        MachineMemory::new(Layout::for_config(&VmConfig::default()).expect("layout"))
    }

    #[test]
    fn push_then_pop() {
        let mut mem = memory();
        let mut stack = Stack::new(&mut mem);
        stack.push(TaggedValue::integer(5)).expect("push");
        assert_eq!(stack.sp(), 1);
        assert_eq!(stack.pop().expect("pop"), TaggedValue::integer(5));
        assert_eq!(stack.sp(), 0);
    }

    #[test]
    fn require_reports_underflow() {
        let mut mem = memory();
        let stack = Stack::new(&mut mem);
        assert!(matches!(
            stack.require(1),
            Err(VmError::StackUnderflow { required: 1, available: 0 })
        ));
    }

    #[test]
    fn require_free_only_rejects_exact_capacity() {
        let mut mem = memory();
        mem.set_sp(4096);
        assert!(matches!(Stack::new(&mut mem).require_free(), Err(VmError::StackFull)));
        mem.set_sp(4097);
        assert!(Stack::new(&mut mem).require_free().is_ok());
    }

    #[test]
    fn swap_with_single_cell_reaches_stack_pointer() {
        let mut mem = memory();
        {
            let mut stack = Stack::new(&mut mem);
            stack.push(TaggedValue::integer(3)).expect("push");
            stack.swap_top().expect("swap");
        }
        assert_eq!(mem.sp(), 3);
        assert_eq!(mem.load_cell(0).expect("cell"), 1);
    }
}
