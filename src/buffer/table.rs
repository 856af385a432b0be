//! Handle table for foreign-owned memory regions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;

/// Opaque identifier for a registered memory region. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BufferHandle(u32);

impl BufferHandle {
    /// Wrap a raw handle received from the host.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buf-{}", self.0)
    }
}

/// Location and length of a foreign memory region.
///
/// The default value (null, 0) is what lookups return on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRegion {
    addr: usize,
    len: u32,
}

impl BufferRegion {
    pub fn new(ptr: *const u8, len: u32) -> Self {
        Self {
            addr: ptr as usize,
            len,
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.addr as *const u8
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True for the zero region returned on a lookup miss.
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }
}

struct TableState {
    entries: HashMap<u32, BufferRegion>,
    last_handle: u32,
}

/// Process-wide registry mapping handles to foreign memory regions.
pub struct BufferTable {
    state: Mutex<TableState>,
    capacity: usize,
}

impl BufferTable {
    /// Create an empty table holding at most `capacity` live handles.
    pub fn new(capacity: usize) -> Self {
        Self::starting_after(0, capacity)
    }

    /// Create a table whose next handle is `last + 1`.
    pub(crate) fn starting_after(last: u32, capacity: usize) -> Self {
        Self {
            state: Mutex::new(TableState {
                entries: HashMap::new(),
                last_handle: last,
            }),
            // Handle 0 is reserved for "no buffer".
            capacity: capacity.min(u32::MAX as usize - 1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a region and return a fresh handle.
    ///
    /// After the counter wraps, handles that are still live are skipped.
    pub fn store(&self, ptr: *const u8, len: u32) -> BridgeResult<BufferHandle> {
        let mut state = self.lock();
        if state.entries.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Buffer table full");
            return Err(BridgeError::HandleSpaceExhausted(self.capacity));
        }

        let mut next = state.last_handle;
        loop {
            next = next.wrapping_add(1);
            if next != 0 && !state.entries.contains_key(&next) {
                break;
            }
        }
        state.last_handle = next;
        state.entries.insert(next, BufferRegion::new(ptr, len));
        metrics::record_buffers_live(state.entries.len());

        tracing::trace!(handle = next, len, "Buffer stored");
        Ok(BufferHandle(next))
    }

    /// Look up a region. Unknown handles yield the zero region.
    pub fn lookup(&self, handle: BufferHandle) -> BufferRegion {
        self.lock()
            .entries
            .get(&handle.0)
            .copied()
            .unwrap_or_default()
    }

    /// Drop the mapping for `handle`. The memory itself is left untouched.
    ///
    /// Returns the region that was registered, if any.
    pub fn release(&self, handle: BufferHandle) -> Option<BufferRegion> {
        let mut state = self.lock();
        let removed = state.entries.remove(&handle.0);
        if removed.is_some() {
            metrics::record_buffers_live(state.entries.len());
            tracing::trace!(handle = handle.0, "Buffer released");
        }
        removed
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BufferTable {
    fn default() -> Self {
        Self::new(u32::MAX as usize)
    }
}
