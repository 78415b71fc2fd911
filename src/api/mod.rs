// HTTP API: OAuth handshake pages, connection status and forwarded Jira calls

mod connect;
mod pages;
mod session_cookie;
mod tracker;

pub use session_cookie::SessionCookie;

use crate::gateway::Gateway;
use crate::oauth::HandshakeManager;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Shared application state for the relay API
#[derive(Clone)]
pub struct RelayAppState {
    pub handshake: Arc<HandshakeManager>,
    pub gateway: Arc<Gateway>,
    pub session_cookie: SessionCookie,
}

/// Create the relay router
pub fn create_router(state: RelayAppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(connect::routes())
        .merge(tracker::routes())
        .with_state(Arc::new(state))
}
