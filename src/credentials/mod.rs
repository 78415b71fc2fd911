//! Session credential record and the access-token lifecycle.
//!
//! A record is created when the OAuth handshake completes and is replaced
//! only by a token refresh. The Jira site it is scoped to never changes.
//!
//! ```text
//!  NoSession ──handshake──▶ Valid ──now >= expires_at──▶ Expired
//!                             ▲                            │
//!                             └────── refresh succeeded ───┤
//!                                                          │
//!  NoSession ◀────────────── refresh failed ───────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A Jira Cloud site returned by the accessible-resources endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudSite {
    /// Cloud id used to scope every REST call
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Tokens minted by the Atlassian token endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    /// Returns `None` when `now + expires_in` is outside the representable
    /// range.
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))?;

        Some(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

/// Validity of the access token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    Valid,
    Expired,
}

/// Credentials for one authenticated session.
///
/// # Security
/// - Tokens live only in the server-side session store
/// - `Debug` redacts both tokens so they never reach the logs
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredentials {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    site: CloudSite,
}

impl SessionCredentials {
    pub fn new(grant: TokenGrant, site: CloudSite) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
            site,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn site(&self) -> &CloudSite {
        &self.site
    }

    pub fn token_state(&self, now: DateTime<Utc>) -> TokenState {
        if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Valid
        }
    }

    /// Replaces all three token fields. The refresh token rotates, so the
    /// previous one is dropped here and never sent again.
    pub fn apply_refresh(&mut self, grant: TokenGrant) {
        self.access_token = grant.access_token;
        self.refresh_token = grant.refresh_token;
        self.expires_at = grant.expires_at;
    }

    /// Link to an issue on the connected site.
    pub fn browse_url(&self, issue_key: &str) -> String {
        format!("{}/browse/{}", self.site.url.trim_end_matches('/'), issue_key)
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("site", &self.site)
            .finish()
    }
}
