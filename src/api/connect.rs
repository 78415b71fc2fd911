//! Connection lifecycle endpoints: OAuth start/callback, status, disconnect.

use super::pages;
use super::RelayAppState;
use crate::gateway::ConnectionStatus;
use crate::error::RelayError;
use crate::oauth::CallbackParams;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct DisconnectResponse {
    success: bool,
}

pub(super) fn routes() -> Router<Arc<RelayAppState>> {
    Router::new()
        .route("/auth/jira", get(oauth_start))
        .route("/auth/jira/callback", get(oauth_callback))
        .route("/api/status", get(status))
        .route("/api/disconnect", post(disconnect))
}

/// GET /auth/jira
///
/// Starts the OAuth flow: binds a CSRF state to the caller's session
/// (issuing a session cookie if needed) and redirects to Atlassian.
async fn oauth_start(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), RelayError> {
    let (jar, session_id) = state.session_cookie.ensure(jar);
    let auth_url = state.handshake.initiate(&session_id).await?;
    Ok((jar, Redirect::temporary(&auth_url)))
}

/// GET /auth/jira/callback
///
/// Always answers with an HTML page: a confirmation that returns to `/`
/// after a short delay, or an error page with the reason.
async fn oauth_callback(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(session_id) = state.session_cookie.session_id(&jar) else {
        warn!("OAuth callback without session cookie");
        let err = RelayError::CsrfMismatch;
        return (err.status_code(), pages::error_page(&err.to_string())).into_response();
    };

    match state.handshake.complete(&session_id, params).await {
        Ok(credentials) => pages::connected_page(&credentials.site().name).into_response(),
        Err(err) => {
            debug!(session = %session_id, error = %err, "Rendering OAuth error page");
            (err.status_code(), pages::error_page(&err.to_string())).into_response()
        }
    }
}

/// GET /api/status
async fn status(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
) -> Result<Json<ConnectionStatus>, RelayError> {
    let status = match state.session_cookie.session_id(&jar) {
        Some(session_id) => state.gateway.status(&session_id).await?,
        None => ConnectionStatus {
            connected: false,
            site: None,
            site_url: None,
        },
    };
    Ok(Json(status))
}

/// POST /api/disconnect
async fn disconnect(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DisconnectResponse>), RelayError> {
    if let Some(session_id) = state.session_cookie.session_id(&jar) {
        state.gateway.disconnect(&session_id).await?;
    }
    let jar = state.session_cookie.clear(jar);
    Ok((jar, Json(DisconnectResponse { success: true })))
}
