//! Tagged Value Representation
//!
//! One stack cell is a raw 64-bit word. The top bit discriminates between a
//! 63-bit integer and a handle to a buffer owned by the string heap.

use super::heap::HandleId;

/// Bit that marks a cell as a string handle.
pub const TAG_BIT: u64 = 1 << 63;

/// A raw stack cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaggedValue(u64);

impl TaggedValue {
    /// Wrap a raw word exactly as stored in memory.
    pub const fn from_raw(raw: u64) -> Self {
        TaggedValue(raw)
    }

    /// Build an integer cell. The tag bit is cleared unconditionally.
    pub const fn integer(value: u64) -> Self {
        TaggedValue(value & !TAG_BIT)
    }

    pub const fn handle(id: HandleId) -> Self {
        TaggedValue(id.raw() | TAG_BIT)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_handle(self) -> bool {
        self.0 & TAG_BIT == TAG_BIT
    }

    pub fn decode(self) -> Value {
        if self.is_handle() {
            Value::String(HandleId::from_raw(self.0 ^ TAG_BIT))
        } else {
            Value::Integer(self.0)
        }
    }
}

/// Decoded view of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Integer(u64),
    String(HandleId),
}
