//! Server-side sessions keyed by an opaque session id.
//!
//! The relay never keeps per-user state outside this store. Every operation
//! receives the session id explicitly and goes through [`SessionStore`].

mod locks;
mod memory;

pub use locks::{SessionLockGuard, SessionLocks};
pub use memory::{run_session_cleanup, InMemorySessionStore};

use crate::credentials::SessionCredentials;
use crate::error::RelayError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// CSRF state bound to a session while an authorization is in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingState {
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl PendingState {
    pub fn new(value: String) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now - self.created_at > expiry
    }
}

/// Everything the relay keeps for one browser session.
#[derive(Clone, Debug)]
pub struct SessionData {
    pub pending_state: Option<PendingState>,
    pub credentials: Option<SessionCredentials>,
    pub last_seen: DateTime<Utc>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            pending_state: None,
            credentials: None,
            last_seen: Utc::now(),
        }
    }
}

/// Pluggable session storage.
///
/// A `set` must be visible to the next `get` for the same id. Callers that
/// read, modify and write a session hold its [`SessionLocks`] entry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, RelayError>;

    async fn set(&self, session_id: &str, data: SessionData) -> Result<(), RelayError>;

    async fn destroy(&self, session_id: &str) -> Result<(), RelayError>;
}
