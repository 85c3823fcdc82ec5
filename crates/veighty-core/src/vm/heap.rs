//! String Heap
//!
//! Owns every string buffer referenced from the stack. A cell only carries a
//! `HandleId`; popping it moves the `StrBuf` out of the heap, and dropping
//! the `StrBuf` frees it. Ids are never reused, so a stale or forged handle
//! fails lookup instead of aliasing a newer buffer.

use std::collections::HashMap;
use std::fmt;

use crate::error::{VmError, VmResult};
use super::value::TAG_BIT;

/// Heap identifier carried in the low 63 bits of a string cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub const fn from_raw(raw: u64) -> Self {
        HandleId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// An owned, immutable string buffer.
///
/// Contents follow C string rules: construction stops at the first NUL
/// byte, so `len()` is what `strlen` would report. Deliberately not `Clone`;
/// use [`StrBuf::deep_copy`] when a second owner is required.
#[derive(PartialEq, Eq)]
pub struct StrBuf(Box<[u8]>);

impl StrBuf {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        StrBuf(bytes[..end].into())
    }

    /// `self` followed by `other`; both inputs are consumed.
    pub fn concat(self, other: StrBuf) -> Self {
        let mut joined = Vec::with_capacity(self.0.len() + other.0.len());
        joined.extend_from_slice(&self.0);
        joined.extend_from_slice(&other.0);
        StrBuf(joined.into_boxed_slice())
    }

    pub fn deep_copy(&self) -> Self {
        StrBuf(self.0.clone())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, needle: &StrBuf) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.0.windows(needle.len()).any(|w| w == needle.as_bytes())
    }
}

impl fmt::Debug for StrBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrBuf({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Owner of all live string buffers.
#[derive(Debug)]
pub struct StringHeap {
    buffers: HashMap<HandleId, StrBuf>,
    next_id: u64,
    max_live: usize,
}

impl StringHeap {
    pub fn new(max_live: usize) -> Self {
        StringHeap {
            buffers: HashMap::new(),
            next_id: 1,
            max_live,
        }
    }

    /// Take ownership of `buf` and hand back its id.
    pub fn alloc(&mut self, buf: StrBuf) -> VmResult<HandleId> {
        if self.buffers.len() >= self.max_live || self.next_id & TAG_BIT != 0 {
            return Err(VmError::AllocationFailure);
        }
        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, buf);
        Ok(id)
    }

    /// Move a buffer out of the heap. The id is dead afterwards.
    pub fn take(&mut self, id: HandleId) -> VmResult<StrBuf> {
        self.buffers
            .remove(&id)
            .ok_or(VmError::DanglingHandle(id.raw()))
    }

    pub fn get(&self, id: HandleId) -> VmResult<&StrBuf> {
        self.buffers
            .get(&id)
            .ok_or(VmError::DanglingHandle(id.raw()))
    }

    /// Number of buffers currently owned
    pub fn live(&self) -> usize {
        self.buffers.len()
    }
}
