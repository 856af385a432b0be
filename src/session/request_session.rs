//! Per-request session.
//!
//! # Responsibilities
//! - Own the command queue and the inbound body channel
//! - Hold the at-most-once header and body filter slots
//! - Keep payloads exported to the host alive until the session is freed
//! - Track lifecycle state and whether the handler has decided
//!
//! # Design Decisions
//! - Body chunks travel over an unbounded SPSC channel so `send_body` never blocks
//! - Teardown does not abort the handler task; its later pushes are dropped

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use hyper::body::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::buffer::BufferHandle;
use crate::command::{Command, CommandQueue};
use crate::error::{BridgeError, BridgeResult, HandlerError};
use crate::handler::filters::{BodyFilter, HeaderFilter};
use crate::observability::metrics;
use crate::session::state::StateCell;
use crate::session::{SessionId, SessionState};

/// One chunk of the inbound request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyChunk {
    pub data: Bytes,
    /// Set on the final chunk only.
    pub last: bool,
}

pub(crate) type BodySender = mpsc::UnboundedSender<BodyChunk>;
pub(crate) type BodyReceiver = mpsc::UnboundedReceiver<BodyChunk>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the host-facing API and the handler task.
pub struct RequestSession {
    id: SessionId,
    /// Correlation ID attached to every log line of this session.
    trace_id: Uuid,
    state: StateCell,
    queue: CommandQueue,
    body_tx: Mutex<Option<BodySender>>,
    body_rx: Mutex<Option<BodyReceiver>>,
    header_filter: OnceLock<HeaderFilter>,
    body_filter: OnceLock<BodyFilter>,
    decided: AtomicBool,
    body_requested: AtomicBool,
    /// Buffer-table registrations backed by bytes this session owns.
    exports: Mutex<Vec<(BufferHandle, Bytes)>>,
}

impl RequestSession {
    pub(crate) fn new(id: SessionId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id,
            trace_id: Uuid::new_v4(),
            state: StateCell::new(),
            queue: CommandQueue::new(),
            body_tx: Mutex::new(Some(tx)),
            body_rx: Mutex::new(Some(rx)),
            header_filter: OnceLock::new(),
            body_filter: OnceLock::new(),
            decided: AtomicBool::new(false),
            body_requested: AtomicBool::new(false),
            exports: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// `Created → Running`.
    pub(crate) fn begin(&self) -> BridgeResult<()> {
        self.state
            .transition(SessionState::Created, SessionState::Running)
            .map_err(|actual| BridgeError::InvalidState {
                id: self.id,
                expected: SessionState::Created,
                actual,
            })
    }

    /// `Running → Finished`, queueing the terminal command first.
    pub(crate) fn finish(&self) {
        self.emit(Command::Done);
        if let Err(actual) = self
            .state
            .transition(SessionState::Running, SessionState::Finished)
        {
            tracing::debug!(session_id = %self.id, state = %actual, "Handler finished after teardown");
        }
    }

    /// Move to `Freed`, drop pending commands and close the body channel.
    pub(crate) fn teardown(&self) -> SessionState {
        let previous = self.state.replace(SessionState::Freed);
        self.queue.teardown();
        lock(&self.body_tx).take();
        lock(&self.body_rx).take();
        previous
    }

    /// Keep `data` alive for as long as `handle` is registered.
    ///
    /// Returns false once the session is freed; the caller then releases the handle.
    pub(crate) fn retain_export(&self, handle: BufferHandle, data: Bytes) -> bool {
        let mut exports = lock(&self.exports);
        if self.is_freed() {
            return false;
        }
        exports.push((handle, data));
        true
    }

    /// Hand back every export so the handles can be released. Call after teardown.
    pub(crate) fn take_exports(&self) -> Vec<BufferHandle> {
        lock(&self.exports).drain(..).map(|(handle, _)| handle).collect()
    }

    pub(crate) fn take_body_receiver(&self) -> Option<BodyReceiver> {
        lock(&self.body_rx).take()
    }

    /// Deliver one inbound body chunk to the handler.
    pub(crate) fn send_body(&self, last: bool, data: Bytes) -> BridgeResult<()> {
        match self.state() {
            SessionState::Running | SessionState::Finished => {}
            actual => {
                return Err(BridgeError::InvalidState {
                    id: self.id,
                    expected: SessionState::Running,
                    actual,
                })
            }
        }

        let mut body_tx = lock(&self.body_tx);
        let sender = body_tx.as_ref().ok_or(BridgeError::BodyClosed(self.id))?;
        let len = data.len();
        if sender.send(BodyChunk { data, last }).is_err() {
            tracing::trace!(session_id = %self.id, len, "Handler stopped reading body, chunk discarded");
        }
        if last {
            body_tx.take();
        }
        Ok(())
    }

    /// Queue a command. Returns false when the session no longer accepts commands.
    pub(crate) fn emit(&self, command: Command) -> bool {
        let kind = command.kind();
        if self.queue.push(command) {
            metrics::record_command(kind);
            tracing::trace!(session_id = %self.id, command = kind, "Command queued");
            true
        } else {
            tracing::debug!(session_id = %self.id, command = kind, "Session closed, command dropped");
            false
        }
    }

    pub(crate) fn poll(&self, blocking: bool) -> Option<Command> {
        self.queue.poll(blocking)
    }

    /// True once the terminal command has been delivered.
    pub fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    pub fn is_freed(&self) -> bool {
        self.state() == SessionState::Freed
    }

    pub(crate) fn install_header_filter(&self, filter: HeaderFilter) -> Result<(), HandlerError> {
        self.header_filter
            .set(filter)
            .map_err(|_| HandlerError::FilterInstalled("header"))
    }

    pub(crate) fn install_body_filter(&self, filter: BodyFilter) -> Result<(), HandlerError> {
        self.body_filter
            .set(filter)
            .map_err(|_| HandlerError::FilterInstalled("body"))
    }

    pub(crate) fn header_filter(&self) -> Option<&HeaderFilter> {
        self.header_filter.get()
    }

    pub(crate) fn body_filter(&self) -> Option<&BodyFilter> {
        self.body_filter.get()
    }

    /// Claim the single respond-or-forward decision.
    pub(crate) fn mark_decided(&self) -> Result<(), HandlerError> {
        if self.decided.swap(true, Ordering::AcqRel) {
            Err(HandlerError::AlreadyDecided)
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_decided(&self) -> bool {
        self.decided.load(Ordering::Acquire)
    }

    /// True only for the first call; used to emit `ReadBody` once.
    pub(crate) fn first_body_request(&self) -> bool {
        !self.body_requested.swap(true, Ordering::AcqRel)
    }
}
