pub mod heap;
pub mod instructions;
pub mod io;
pub mod memory;
pub mod stack;
pub mod value;
pub mod vm;

pub use heap::{HandleId, StrBuf, StringHeap};
pub use memory::{Layout, MachineMemory};
pub use value::{TaggedValue, Value, TAG_BIT};
pub use vm::{HaltReason, Machine, MachineState, RunSummary};
