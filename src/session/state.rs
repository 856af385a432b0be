//! Session lifecycle state machine.
//!
//! # States
//! - Created: id allocated, handler not running
//! - Running: handler executing or waiting for input
//! - Finished: handler completed and `Done` queued (maybe not yet delivered)
//! - Freed: removed from the session table
//!
//! # State Transitions
//! ```text
//! Created → Running: start
//! Running → Finished: handler task completes
//! any → Freed: free
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created = 0,
    Running = 1,
    Finished = 2,
    Freed = 3,
}

impl From<u8> for SessionState {
    fn from(val: u8) -> Self {
        match val {
            0 => SessionState::Created,
            1 => SessionState::Running,
            2 => SessionState::Finished,
            _ => SessionState::Freed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Running => "running",
            SessionState::Finished => "finished",
            SessionState::Freed => "freed",
        };
        f.write_str(name)
    }
}

/// Atomic holder for a `SessionState`.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SessionState::Created as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        self.0.load(Ordering::Acquire).into()
    }

    /// Move `from → to`. On failure returns the actual state.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from)
    }

    /// Force the state, returning the previous one.
    pub(crate) fn replace(&self, to: SessionState) -> SessionState {
        self.0.swap(to as u8, Ordering::AcqRel).into()
    }
}
