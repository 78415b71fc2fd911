//! CSRF state generation and verification.

use crate::error::RelayError;
use crate::session::PendingState;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

const STATE_BYTES: usize = 32;

/// Generates a URL-safe random state value (256 bits of entropy).
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Checks the state presented at callback against the one consumed from the
/// session.
///
/// Rejects when either side is missing, the pending state is older than
/// `expiry`, or the values differ.
pub fn verify_state(
    pending: Option<&PendingState>,
    presented: Option<&str>,
    now: DateTime<Utc>,
    expiry: Duration,
) -> Result<(), RelayError> {
    let (pending, presented) = match (pending, presented) {
        (Some(p), Some(s)) if !s.is_empty() => (p, s),
        _ => return Err(RelayError::CsrfMismatch),
    };

    if pending.is_expired(now, expiry) {
        return Err(RelayError::CsrfMismatch);
    }

    if !constant_time_eq(pending.value.as_bytes(), presented.as_bytes()) {
        return Err(RelayError::CsrfMismatch);
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
