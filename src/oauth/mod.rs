//! OAuth 2.0 three-legged authorization against Atlassian.
//!
//! Implements the authorization code flow:
//! 1. Browser hits GET /auth/jira → [`HandshakeManager::initiate`] binds a
//!    CSRF state to the session and returns the provider URL
//! 2. User consents on Atlassian's site
//! 3. Atlassian redirects to /auth/jira/callback → [`HandshakeManager::complete`]
//! 4. Code is exchanged for tokens, the accessible Jira site is resolved, and
//!    the session now holds a credential record

mod exchange;
mod provider;
mod site;
mod state;

pub use exchange::TokenClient;
pub use provider::OAuthProviderConfig;
pub use site::{FirstSite, SiteSelector};
pub use state::{generate_state, verify_state};

use crate::credentials::SessionCredentials;
use crate::error::RelayError;
use crate::jira::JiraClient;
use crate::session::{PendingState, SessionLocks, SessionStore};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OAuth callback query parameters
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Drives the redirect / callback handshake for a session.
pub struct HandshakeManager {
    provider: OAuthProviderConfig,
    tokens: TokenClient,
    jira: JiraClient,
    sessions: Arc<dyn SessionStore>,
    locks: SessionLocks,
    selector: Arc<dyn SiteSelector>,
    state_expiry: Duration,
}

impl HandshakeManager {
    pub fn new(
        provider: OAuthProviderConfig,
        tokens: TokenClient,
        jira: JiraClient,
        sessions: Arc<dyn SessionStore>,
        locks: SessionLocks,
    ) -> Self {
        Self {
            provider,
            tokens,
            jira,
            sessions,
            locks,
            selector: Arc::new(FirstSite),
            state_expiry: Duration::seconds(600),
        }
    }

    pub fn with_site_selector(mut self, selector: Arc<dyn SiteSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_state_expiry(mut self, expiry: Duration) -> Self {
        self.state_expiry = expiry;
        self
    }

    /// Binds a fresh CSRF state to the session and returns the provider's
    /// authorization URL. Any earlier pending state for the session is
    /// replaced.
    pub async fn initiate(&self, session_id: &str) -> Result<String, RelayError> {
        let _lock = self.locks.acquire(session_id).await;
        let mut session = self.sessions.get(session_id).await?.unwrap_or_default();

        let csrf_state = generate_state();
        session.pending_state = Some(PendingState::new(csrf_state.clone()));
        self.sessions.set(session_id, session).await?;

        info!(session = %session_id, "Redirecting to Atlassian authorization");

        Ok(self.provider.build_auth_url(&csrf_state))
    }

    /// Completes the handshake from the callback parameters.
    ///
    /// The pending state is consumed before anything else, so a callback can
    /// be attempted at most once per [`initiate`](Self::initiate). On success
    /// the session holds the new credential record; on any failure after the
    /// state check it holds none.
    pub async fn complete(
        &self,
        session_id: &str,
        params: CallbackParams,
    ) -> Result<SessionCredentials, RelayError> {
        debug!(session = %session_id, "OAuth callback received");

        let _lock = self.locks.acquire(session_id).await;

        let Some(mut session) = self.sessions.get(session_id).await? else {
            warn!(session = %session_id, "OAuth callback for unknown session");
            return Err(RelayError::CsrfMismatch);
        };

        let pending = session.pending_state.take();
        let verified = verify_state(
            pending.as_ref(),
            params.state.as_deref(),
            Utc::now(),
            self.state_expiry,
        );
        if verified.is_ok() {
            session.credentials = None;
        }
        self.sessions.set(session_id, session.clone()).await?;

        if let Err(e) = verified {
            warn!(session = %session_id, "Invalid or expired OAuth state");
            return Err(e);
        }

        debug!(session = %session_id, "CSRF state validated");

        if let Some(error) = params.error {
            let description = params
                .error_description
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(
                session = %session_id,
                error = %error,
                description = %description,
                "OAuth authorization failed"
            );
            return Err(RelayError::AuthorizationDenied(format!(
                "{} - {}",
                error, description
            )));
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(RelayError::MissingAuthorizationCode)?;

        let grant = self.tokens.exchange_code(&code).await.map_err(|e| {
            warn!(session = %session_id, error = %e, "Token exchange failed");
            e
        })?;

        let sites = self.jira.accessible_resources(&grant.access_token).await?;
        debug!(session = %session_id, count = sites.len(), "Accessible resources fetched");

        let site = self
            .selector
            .select(sites)
            .ok_or(RelayError::NoAccessibleResources)?;

        let credentials = SessionCredentials::new(grant, site);
        session.credentials = Some(credentials.clone());
        self.sessions.set(session_id, session).await?;

        info!(
            session = %session_id,
            cloud_id = %credentials.site().id,
            site = %credentials.site().name,
            "OAuth flow completed successfully"
        );

        Ok(credentials)
    }
}
