//! Registry of live sessions.
//!
//! # Responsibilities
//! - Allocate identifiers that are unique among live sessions
//! - Look up sessions for boundary calls
//! - Remove sessions on free
//!
//! # Design Decisions
//! - One table-wide lock; it guards only metadata and is never held while
//!   a handler or filter runs
//! - Identifiers come from a wrapping counter that skips 0 and live ids

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;
use crate::session::{RequestSession, SessionId};

struct TableState {
    sessions: HashMap<SessionId, Arc<RequestSession>>,
    last_id: u32,
}

/// Concurrent registry of sessions keyed by generated identifier.
pub struct SessionTable {
    state: Mutex<TableState>,
    capacity: usize,
}

impl SessionTable {
    /// Create a table allowing at most `capacity` live sessions.
    pub fn new(capacity: usize) -> Self {
        Self::starting_after(0, capacity)
    }

    /// Create a table whose next identifier is `last + 1`.
    pub(crate) fn starting_after(last: u32, capacity: usize) -> Self {
        Self {
            state: Mutex::new(TableState {
                sessions: HashMap::new(),
                last_id: last,
            }),
            capacity: capacity.min(u32::MAX as usize - 1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate and register a session in the `Created` state.
    pub fn create(&self) -> BridgeResult<Arc<RequestSession>> {
        let mut state = self.lock();
        if state.sessions.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Session table full");
            return Err(BridgeError::SessionSpaceExhausted(self.capacity));
        }

        let mut next = state.last_id;
        let id = loop {
            next = next.wrapping_add(1);
            let candidate = SessionId::from_raw(next);
            if next != 0 && !state.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        state.last_id = next;

        let session = Arc::new(RequestSession::new(id));
        state.sessions.insert(id, session.clone());
        metrics::record_sessions_live(state.sessions.len());
        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<RequestSession>> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Unregister a session. The caller tears it down.
    pub fn remove(&self, id: SessionId) -> Option<Arc<RequestSession>> {
        let mut state = self.lock();
        let removed = state.sessions.remove(&id);
        if removed.is_some() {
            metrics::record_sessions_live(state.sessions.len());
        }
        removed
    }

    /// Unregister every session.
    pub fn drain(&self) -> Vec<Arc<RequestSession>> {
        let mut state = self.lock();
        let drained = state.sessions.drain().map(|(_, s)| s).collect();
        metrics::record_sessions_live(0);
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
