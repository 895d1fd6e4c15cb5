//! Shared identifiers and error types.

pub mod errors;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub use errors::{ChatError, ChatResult, TransportError};

/// Room identifier taken verbatim from the request path.
pub type RoomId = String;

/// Process-unique handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Verified subject attached to a connection by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
}

impl Identity {
    /// Wrap a verified subject. Blank subjects are rejected.
    pub fn new(subject: impl Into<String>) -> Option<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            None
        } else {
            Some(Self { subject })
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)
    }
}
