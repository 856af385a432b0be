//! Error definitions for the bridge boundary and the handler side.

use thiserror::Error;

use crate::config::ValidationError;
use crate::session::{SessionId, SessionState};

/// Errors surfaced by the host-facing boundary operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The identifier does not name a live session.
    #[error("session {0} is not registered")]
    UnknownSession(SessionId),

    /// The operation is not valid in the session's current state.
    #[error("session {id} is {actual}, operation requires {expected}")]
    InvalidState {
        id: SessionId,
        expected: SessionState,
        actual: SessionState,
    },

    /// A request head or header block could not be parsed.
    #[error("malformed header data: {0}")]
    MalformedRequest(#[from] ParseError),

    /// A body chunk arrived after the last chunk was delivered.
    #[error("request body of session {0} is already complete")]
    BodyClosed(SessionId),

    /// Every session identifier is in use.
    #[error("no free session identifiers (limit {0})")]
    SessionSpaceExhausted(usize),

    /// Every buffer handle is in use.
    #[error("no free buffer handles (limit {0})")]
    HandleSpaceExhausted(usize),

    /// A payload does not fit the 32-bit length used across the boundary.
    #[error("payload of {0} bytes exceeds the boundary length limit")]
    PayloadTooLarge(usize),

    /// The handler runtime has been shut down.
    #[error("handler runtime is shut down")]
    ShutDown,

    /// The configuration handed to the bridge failed validation.
    #[error(
        "invalid bridge configuration: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Config(Vec<ValidationError>),

    /// The handler runtime could not be created.
    #[error("failed to build handler runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Result type for boundary operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced while parsing a request head or header block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request head is empty")]
    Empty,

    #[error("invalid request line {0:?}")]
    RequestLine(String),

    #[error("invalid method {0:?}")]
    Method(String),

    #[error("invalid request target {0:?}")]
    Target(String),

    #[error("unsupported protocol version {0:?}")]
    Version(String),

    #[error("invalid header line {0:?}")]
    HeaderLine(String),

    #[error("invalid header name {0:?}")]
    HeaderName(String),

    #[error("invalid value for header {0:?}")]
    HeaderValue(String),
}

/// Errors raised by handler code running inside a session.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request was already answered directly or forwarded.
    #[error("request has already been answered or forwarded")]
    AlreadyDecided,

    /// A filter slot can only be filled once.
    #[error("{0} filter is already installed")]
    FilterInstalled(&'static str),

    /// The status code is outside 100..=999.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    /// Header manipulation failed validation.
    #[error(transparent)]
    Header(#[from] ParseError),

    /// Handler-specific failure.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::UnknownSession(SessionId::from_raw(7));
        assert_eq!(err.to_string(), "session sess-7 is not registered");

        let err = BridgeError::InvalidState {
            id: SessionId::from_raw(3),
            expected: SessionState::Created,
            actual: SessionState::Running,
        };
        assert_eq!(
            err.to_string(),
            "session sess-3 is running, operation requires created"
        );

        let err: BridgeError = ParseError::Empty.into();
        assert!(err.to_string().contains("request head is empty"));
    }

    #[test]
    fn test_handler_error_from_parse() {
        let err: HandlerError = ParseError::HeaderName("bad name".into()).into();
        assert_eq!(err.to_string(), "invalid header name \"bad name\"");
    }
}
