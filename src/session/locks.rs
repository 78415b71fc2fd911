use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Per-session mutual exclusion for read-modify-write cycles on the store.
///
/// The handshake and the gateway share one instance, so a token refresh, a
/// disconnect and a new authorization for the same session never interleave.
/// An entry only exists while some task holds or waits for that session's
/// lock; ids that are never used again leave nothing behind.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<LockMap>,
}

/// Held lock for one session. Dropping it releases the lock and removes the
/// map entry when no other task is waiting.
pub struct SessionLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    session_id: String,
    locks: Arc<LockMap>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: &str) -> SessionLockGuard {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let mut held = SessionLockGuard {
            guard: None,
            session_id: session_id.to_string(),
            locks: self.locks.clone(),
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Number of sessions with a held or awaited lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own reference left: nobody holds or waits
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
