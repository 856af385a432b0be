//! Host-facing boundary surface.
//!
//! # Responsibilities
//! - Tie the session table, buffer table and handler runtime together
//! - Validate every host call against the session lifecycle
//! - Run filters synchronously on the host's thread
//!
//! # Design Decisions
//! - Contract violations are typed errors, never panics
//! - No lock is held while a handler, filter or blocking poll runs
//! - Shutdown frees every session before stopping the runtime so blocked
//!   pollers and body readers wake up

use std::sync::Arc;

use hyper::body::Bytes;

use crate::buffer::{BufferHandle, BufferTable};
use crate::command::Command;
use crate::config::{validate_config, BridgeConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::handler::filters::{apply_body_filter, apply_header_filter};
use crate::handler::{HandlerRuntime, RequestHandler, TestHandler};
use crate::http::{HeaderBlock, RequestHead};
use crate::observability::metrics;
use crate::session::{RequestSession, SessionId, SessionState, SessionTable};

pub struct Bridge {
    config: BridgeConfig,
    sessions: SessionTable,
    buffers: BufferTable,
    runtime: HandlerRuntime,
}

impl Bridge {
    /// Build a bridge from `config`, which is validated first.
    pub fn new(config: BridgeConfig) -> BridgeResult<Self> {
        validate_config(&config).map_err(BridgeError::Config)?;
        let runtime = HandlerRuntime::new(&config.runtime)?;
        let bridge = Self {
            sessions: SessionTable::new(config.sessions.max_sessions),
            buffers: BufferTable::new(config.buffers.max_buffers),
            runtime,
            config,
        };
        if bridge.config.handler.install_test_handler {
            bridge.install_test_handler();
        }

        tracing::info!(
            worker_threads = bridge.config.runtime.worker_threads,
            max_sessions = bridge.config.sessions.max_sessions,
            max_buffers = bridge.config.buffers.max_buffers,
            handler = %bridge.runtime.handler_name(),
            "Bridge initialized"
        );
        Ok(bridge)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The shared buffer table.
    pub fn buffers(&self) -> &BufferTable {
        &self.buffers
    }

    fn session(&self, id: SessionId) -> BridgeResult<Arc<RequestSession>> {
        self.sessions.get(id).ok_or(BridgeError::UnknownSession(id))
    }

    /// Register a new session in the `Created` state.
    pub fn create_session(&self) -> BridgeResult<SessionId> {
        if self.runtime.is_shut_down() {
            return Err(BridgeError::ShutDown);
        }
        let session = self.sessions.create()?;
        metrics::record_session_created();
        tracing::debug!(session_id = %session.id(), trace_id = %session.trace_id(), "Session created");
        Ok(session.id())
    }

    /// Parse the request head and launch the handler.
    ///
    /// A malformed head leaves the session in `Created`.
    pub fn start_session(&self, id: SessionId, raw_head: &str) -> BridgeResult<()> {
        let session = self.session(id)?;
        let state = session.state();
        if state != SessionState::Created {
            return Err(BridgeError::InvalidState {
                id,
                expected: SessionState::Created,
                actual: state,
            });
        }

        let head = RequestHead::parse(raw_head).inspect_err(|e| {
            tracing::warn!(session_id = %id, error = %e, "Rejected malformed request head");
        })?;
        session.begin()?;

        tracing::debug!(
            session_id = %id,
            method = %head.method,
            uri = %head.uri,
            "Session started"
        );
        if let Err(e) = self.runtime.launch(session.clone(), head) {
            // The session is already Running; close it out so pollers terminate
            session.emit(Command::Error {
                message: e.to_string(),
            });
            session.finish();
            return Err(e);
        }
        Ok(())
    }

    /// Take the next command.
    ///
    /// Returns `None` when nothing is queued (non-blocking), when the session
    /// is freed while waiting, and for every poll after `Done`.
    pub fn poll_session(&self, id: SessionId, blocking: bool) -> BridgeResult<Option<Command>> {
        let session = self.session(id)?;
        if session.is_drained() {
            tracing::warn!(session_id = %id, "Poll after Done");
            return Ok(None);
        }
        let command = session.poll(blocking);
        if let Some(command) = &command {
            tracing::trace!(session_id = %id, command = command.kind(), "Command delivered");
        }
        Ok(command)
    }

    /// Copy one inbound body chunk and deliver it to the handler.
    pub fn send_body_chunk(&self, id: SessionId, last: bool, data: &[u8]) -> BridgeResult<()> {
        let session = self.session(id)?;
        session.send_body(last, Bytes::copy_from_slice(data))
    }

    /// Run the header filter over a CRLF-delimited header block.
    ///
    /// `None` means unchanged: no filter is installed or it declined.
    pub fn transform_headers(&self, id: SessionId, block: &str) -> BridgeResult<Option<String>> {
        let session = self.session(id)?;
        let Some(filter) = session.header_filter() else {
            return Ok(None);
        };
        let headers = HeaderBlock::parse(block)?;
        Ok(apply_header_filter(filter, &headers).map(|out| out.to_wire()))
    }

    /// Run the body filter over one chunk of the target's response body.
    pub fn transform_body(&self, id: SessionId, last: bool, data: &[u8]) -> BridgeResult<Option<Bytes>> {
        let session = self.session(id)?;
        Ok(session
            .body_filter()
            .and_then(|filter| apply_body_filter(filter, data, last)))
    }

    /// Register `data` in the buffer table on behalf of a session.
    ///
    /// The bytes and the mapping stay valid until the session is freed.
    pub fn export_chunk(&self, id: SessionId, data: Bytes) -> BridgeResult<(BufferHandle, u32)> {
        let session = self.session(id)?;
        let length = u32::try_from(data.len()).map_err(|_| BridgeError::PayloadTooLarge(data.len()))?;
        let handle = self.buffers.store(data.as_ptr(), length)?;
        if !session.retain_export(handle, data) {
            self.buffers.release(handle);
            return Err(BridgeError::UnknownSession(id));
        }
        tracing::trace!(session_id = %id, handle = %handle, length, "Chunk exported");
        Ok((handle, length))
    }

    /// Remove the session and tear it down. A second call fails with `UnknownSession`.
    pub fn free_session(&self, id: SessionId) -> BridgeResult<()> {
        let session = self.sessions.remove(id).ok_or_else(|| {
            tracing::warn!(session_id = %id, "Free of unknown session");
            BridgeError::UnknownSession(id)
        })?;
        let previous = self.close(&session);
        tracing::debug!(session_id = %id, previous = %previous, "Session freed");
        Ok(())
    }

    /// Tear down an unregistered session and release its exported buffers.
    fn close(&self, session: &RequestSession) -> SessionState {
        let previous = session.teardown();
        for handle in session.take_exports() {
            self.buffers.release(handle);
        }
        metrics::record_session_freed();
        previous
    }

    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(id).map(|s| s.state())
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Replace the handler for sessions started from now on.
    pub fn install_handler<H: RequestHandler>(&self, handler: H) {
        self.runtime.install(handler);
    }

    pub fn install_test_handler(&self) {
        self.install_handler(TestHandler);
    }

    pub fn handler_name(&self) -> String {
        self.runtime.handler_name()
    }

    /// Free every session and stop the runtime.
    ///
    /// Must not be called from inside a handler task.
    pub fn shutdown(&self) {
        let sessions = self.sessions.drain();
        let count = sessions.len();
        for session in sessions {
            self.close(&session);
        }
        tracing::info!(freed_sessions = count, "Bridge shutting down");
        self.runtime.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_shut_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ParseError;

    fn bridge() -> Bridge {
        let config = BridgeConfig {
            runtime: RuntimeConfig {
                worker_threads: 1,
                ..RuntimeConfig::default()
            },
            ..BridgeConfig::default()
        };
        Bridge::new(config).unwrap()
    }

    fn drain(bridge: &Bridge, id: SessionId) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Some(command) = bridge.poll_session(id, true).unwrap() {
            let done = command.is_terminal();
            commands.push(command);
            if done {
                break;
            }
        }
        commands
    }

    #[test]
    fn test_pass_through_by_default() {
        let bridge = bridge();
        assert_eq!(bridge.handler_name(), "pass-through");

        let id = bridge.create_session().unwrap();
        bridge.start_session(id, "GET /anything HTTP/1.1\r\nHost: a\r\n").unwrap();
        let commands = drain(&bridge, id);
        assert_eq!(commands.len(), 2);
        assert!(matches!(&commands[0], Command::Proxy(p) if p.uri == "/anything"));
        assert_eq!(commands[1], Command::Done);
        assert_eq!(bridge.session_state(id), Some(SessionState::Finished));

        bridge.free_session(id).unwrap();
        assert_eq!(bridge.live_sessions(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BridgeConfig {
            runtime: RuntimeConfig {
                worker_threads: 0,
                ..RuntimeConfig::default()
            },
            ..BridgeConfig::default()
        };
        let result = std::panic::catch_unwind(|| Bridge::new(config));
        match result {
            Ok(Err(BridgeError::Config(errors))) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "runtime.worker_threads");
            }
            Ok(Err(other)) => panic!("unexpected error {other}"),
            Ok(Ok(_)) => panic!("zero worker threads accepted"),
            Err(_) => panic!("construction panicked"),
        }
    }

    #[test]
    fn test_malformed_head_keeps_created() {
        let bridge = bridge();
        let id = bridge.create_session().unwrap();

        let err = bridge.start_session(id, "").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedRequest(ParseError::Empty)));
        assert_eq!(bridge.session_state(id), Some(SessionState::Created));

        bridge.start_session(id, "GET / HTTP/1.1\r\n").unwrap();
        assert!(matches!(
            bridge.start_session(id, "GET / HTTP/1.1\r\n"),
            Err(BridgeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_unknown_and_double_free() {
        let bridge = bridge();
        let ghost = SessionId::from_raw(42);
        assert!(matches!(bridge.poll_session(ghost, false), Err(BridgeError::UnknownSession(_))));
        assert!(matches!(bridge.send_body_chunk(ghost, true, b"x"), Err(BridgeError::UnknownSession(_))));

        let id = bridge.create_session().unwrap();
        bridge.free_session(id).unwrap();
        assert!(matches!(bridge.free_session(id), Err(BridgeError::UnknownSession(_))));
        assert_eq!(bridge.session_state(id), None);
    }

    #[test]
    fn test_transform_without_filters_is_unchanged() {
        let bridge = bridge();
        let id = bridge.create_session().unwrap();
        assert_eq!(bridge.transform_headers(id, "X-Orig: 1\r\n").unwrap(), None);
        assert_eq!(bridge.transform_body(id, true, b"body").unwrap(), None);
    }

    #[test]
    fn test_exports_released_on_free() {
        let bridge = bridge();
        let id = bridge.create_session().unwrap();
        let data = Bytes::from_static(b"payload");

        let (handle, length) = bridge.export_chunk(id, data.clone()).unwrap();
        assert_eq!(length, 7);
        let region = bridge.buffers().lookup(handle);
        assert_eq!(region.as_ptr(), data.as_ptr());
        assert_eq!(bridge.buffers().len(), 1);

        bridge.free_session(id).unwrap();
        assert!(bridge.buffers().lookup(handle).is_null());
        assert!(bridge.buffers().is_empty());
        assert!(matches!(
            bridge.export_chunk(id, data),
            Err(BridgeError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_shutdown_frees_sessions_and_rejects_new() {
        let bridge = bridge();
        let id = bridge.create_session().unwrap();
        bridge.shutdown();

        assert!(bridge.is_shut_down());
        assert_eq!(bridge.live_sessions(), 0);
        assert!(matches!(bridge.poll_session(id, true), Err(BridgeError::UnknownSession(_))));
        assert!(matches!(bridge.create_session(), Err(BridgeError::ShutDown)));
    }
}
