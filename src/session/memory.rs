use super::{SessionData, SessionStore};
use crate::error::RelayError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory session store with idle expiry.
///
/// State is lost on restart. Sessions idle for longer than the TTL are
/// invisible to `get` and removed by [`run_session_cleanup`].
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SessionData>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Removes sessions idle for longer than the TTL.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.sessions
            .retain(|_, session| now - session.last_seen <= self.ttl);
    }

    /// Get count of live sessions (for debugging/monitoring)
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, RelayError> {
        let now = Utc::now();
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return Ok(None);
        };

        if now - entry.last_seen > self.ttl {
            drop(entry);
            self.sessions.remove(session_id);
            return Ok(None);
        }

        entry.last_seen = now;
        Ok(Some(entry.value().clone()))
    }

    async fn set(&self, session_id: &str, mut data: SessionData) -> Result<(), RelayError> {
        data.last_seen = Utc::now();
        self.sessions.insert(session_id.to_string(), data);
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), RelayError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

/// Background task to periodically sweep idle sessions
pub async fn run_session_cleanup(store: InMemorySessionStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!(remaining = store.count(), "Session cleanup complete");
    }
}
