//! Session management subsystem.
//!
//! # Data Flow
//! ```text
//! create → table.rs allocates SessionId, registers RequestSession (Created)
//! start  → request_session.rs begin (Running), handler task launched
//! poll   → request_session.rs → command queue
//! handler completes → finish (Done queued, Finished)
//! free   → table.rs remove → teardown (Freed)
//! ```
//!
//! # Design Decisions
//! - Sessions are shared as `Arc<RequestSession>` between the table and the handler task
//! - Removing from the table and tearing down are separate steps so the lock
//!   is never held across queue wake-ups

pub mod id;
pub mod request_session;
pub mod state;
pub mod table;

pub use id::SessionId;
pub use request_session::{BodyChunk, RequestSession};
pub use state::SessionState;
pub use table::SessionTable;
