//! Request session manager and streaming command protocol.
//!
//! A host that owns the network I/O of a reverse proxy hands each inbound
//! request to this library. Every request gets an isolated session whose
//! handler runs on a tokio worker pool; the handler's decisions come back to
//! the host as an ordered stream of commands that the host drains by polling.
//!
//! # Architecture Overview
//!
//! ```text
//!   Host (network I/O)                        Library
//!   ──────────────────                        ───────
//!   create_session ──────────────▶ session::SessionTable (Created)
//!   start_session(raw head) ─────▶ http::RequestHead::parse
//!                                    → handler::HandlerRuntime spawns task
//!                                    → RequestHandler::handle(ctx)
//!   send_body_chunk ─────────────▶   body channel ──▶ ctx.read_body()
//!   poll_session ◀───────────────── command::CommandQueue ◀── decisions
//!   transform_headers/body ──────▶ filters run on the host thread
//!   store/get/release buffer ────▶ buffer::BufferTable (handles, no bytes)
//!   free_session ────────────────▶ teardown (Freed)
//! ```
//!
//! The same surface is exported over the C ABI by [`ffi`].

pub mod bridge;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod ffi;
pub mod handler;
pub mod http;
pub mod observability;
pub mod session;

pub use bridge::Bridge;
pub use buffer::{BufferHandle, BufferRegion, BufferTable};
pub use command::Command;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, HandlerError, ParseError};
pub use handler::{RequestContext, RequestHandler};
pub use session::{SessionId, SessionState};
