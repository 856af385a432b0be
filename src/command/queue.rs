//! Per-session command queue.
//!
//! # States
//! ```text
//! Open → Closed: Done pushed (no further pushes accepted)
//! Closed → Drained: Done delivered (every later poll returns None)
//! any → TornDown: session freed (pending commands dropped, waiters woken)
//! ```
//!
//! # Design Decisions
//! - Mutex + Condvar: producers never block, only a blocking poll waits
//! - A non-blocking poll is a single lock-and-pop
//! - Delivering Done or tearing down wakes every waiter so nobody hangs

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::command::Command;

#[derive(Default)]
struct QueueState {
    items: VecDeque<Command>,
    terminal_queued: bool,
    terminal_delivered: bool,
    torn_down: bool,
}

/// Ordered hand-off of commands from the handler to the host.
#[derive(Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command. Returns false if the queue no longer accepts commands.
    pub fn push(&self, command: Command) -> bool {
        let mut state = self.lock();
        if state.torn_down || state.terminal_queued {
            return false;
        }
        if command.is_terminal() {
            state.terminal_queued = true;
        }
        state.items.push_back(command);
        drop(state);

        self.ready.notify_one();
        true
    }

    /// Take the next command.
    ///
    /// With `blocking`, waits until a command is available or the queue can
    /// never yield one again.
    pub fn poll(&self, blocking: bool) -> Option<Command> {
        let mut state = self.lock();
        loop {
            if state.terminal_delivered || state.torn_down {
                return None;
            }
            if let Some(command) = state.items.pop_front() {
                if command.is_terminal() {
                    state.terminal_delivered = true;
                    drop(state);
                    // Release any other waiter; nothing follows Done.
                    self.ready.notify_all();
                }
                return Some(command);
            }
            if !blocking {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Drop pending commands, reject future pushes and wake all waiters.
    pub fn teardown(&self) {
        let mut state = self.lock();
        state.torn_down = true;
        state.items.clear();
        drop(state);
        self.ready.notify_all();
    }

    /// True once `Done` has been handed to a poller.
    pub fn is_drained(&self) -> bool {
        self.lock().terminal_delivered
    }

    /// True once `Done` has been queued.
    pub fn is_closed(&self) -> bool {
        self.lock().terminal_queued
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
