//! Session identifiers.

use serde::Serialize;

/// Identifier of a live session. Never zero; zero means "no session" at the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Wrap a raw identifier received from the host.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}
