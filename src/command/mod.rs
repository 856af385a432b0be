//! Streaming command protocol.
//!
//! # Data Flow
//! ```text
//! handler decision (respond / forward / install filter / fail)
//!     → Command values appended to the session's queue.rs
//!     → host polls, one command at a time, in production order
//!     → ... → Done (unique, always last)
//! ```
//!
//! # Design Decisions
//! - Commands are typed values; text encoding belongs to the boundary layer
//! - `Done` closes the queue: later pushes are rejected
//! - Blocking poll is the only suspension point for the host

pub mod queue;

use hyper::body::Bytes;
use serde_json::json;

use crate::http::{HeaderBlock, ProxyRequest};

pub use queue::CommandQueue;

/// One step of proxying work for the host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// The handler is reading the request body; stream it with `send_body_chunk`.
    ReadBody,
    /// Start a direct response to the client.
    SendHeaders { status: u16, headers: HeaderBlock },
    /// A chunk of the direct response body.
    SendBody { data: Bytes },
    /// Forward the (possibly edited) request to the target.
    Proxy(ProxyRequest),
    /// Target response headers must go through `transform_headers`.
    FilterHeaders,
    /// Target response body chunks must go through `transform_body`.
    FilterBody,
    /// The handler failed.
    Error { message: String },
    /// Terminal marker.
    Done,
}

impl Command {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::ReadBody => "read_body",
            Command::SendHeaders { .. } => "send_headers",
            Command::SendBody { .. } => "send_body",
            Command::Proxy(_) => "proxy",
            Command::FilterHeaders => "filter_headers",
            Command::FilterBody => "filter_body",
            Command::Error { .. } => "error",
            Command::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Done)
    }

    /// Human-readable JSON rendering; body bytes are shown as lossy UTF-8.
    pub fn summary(&self) -> serde_json::Value {
        match self {
            Command::SendHeaders { status, headers } => json!({
                "command": self.kind(),
                "status": status,
                "headers": headers,
            }),
            Command::SendBody { data } => json!({
                "command": self.kind(),
                "length": data.len(),
                "data": String::from_utf8_lossy(data),
            }),
            Command::Proxy(request) => json!({
                "command": self.kind(),
                "method": request.method.as_str(),
                "uri": request.uri.to_string(),
                "headers": request.headers,
                "target": request.target,
            }),
            Command::Error { message } => json!({
                "command": self.kind(),
                "message": message,
            }),
            _ => json!({ "command": self.kind() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_terminal() {
        assert_eq!(Command::Done.kind(), "done");
        assert!(Command::Done.is_terminal());
        assert!(!Command::ReadBody.is_terminal());
        assert!(!Command::Error { message: "x".into() }.is_terminal());
    }

    #[test]
    fn test_summary() {
        let mut headers = HeaderBlock::new();
        headers.append("Content-Length", "5").unwrap();
        let summary = Command::SendHeaders { status: 200, headers }.summary();
        assert_eq!(summary["command"], "send_headers");
        assert_eq!(summary["status"], 200);
        assert_eq!(summary["headers"][0][0], "Content-Length");

        let summary = Command::SendBody {
            data: Bytes::from_static(b"hello"),
        }
        .summary();
        assert_eq!(summary["data"], "hello");
        assert_eq!(summary["length"], 5);
    }
}
