//! HTTP data handled inside a session.
//!
//! # Data Flow
//! ```text
//! raw request head (from host)
//!     → request.rs (parse into RequestHead, derive ProxyRequest)
//!     → handler edits ProxyRequest or builds a DirectResponse
//!     → response.rs (lower DirectResponse into commands)
//!
//! header blocks from the target (via transform_headers)
//!     → headers.rs (parse, filter, render back to CRLF lines)
//! ```
//!
//! # Design Decisions
//! - Socket I/O and wire framing stay in the host
//! - Header casing and order are preserved end to end

pub mod headers;
pub mod request;
pub mod response;

pub use headers::HeaderBlock;
pub use request::{ProxyRequest, RequestHead};
pub use response::DirectResponse;
