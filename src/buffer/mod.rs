//! Shared buffer subsystem.
//!
//! # Data Flow
//! ```text
//! Host allocates memory (malloc, arena, ...)
//!     → table.rs store(ptr, len) → BufferHandle
//!     → handle travels across the boundary instead of the bytes
//!     → table.rs lookup(handle) → (ptr, len)
//!     → release(handle) drops the mapping only
//!     → the original allocator frees the memory
//! ```
//!
//! # Design Decisions
//! - The table stores addresses, never bytes; it never dereferences them
//! - One table-wide lock guards both the map and the handle counter
//! - Lookup misses return the zero region instead of an error

pub mod table;

pub use table::{BufferHandle, BufferRegion, BufferTable};
