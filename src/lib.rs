// HTTP API (axum routers)
pub mod api;

// Configuration loading
pub mod config;

// Session credential record and token lifecycle
pub mod credentials;

// Error taxonomy
pub mod error;

// Token refresh and forwarded Jira calls
pub mod gateway;

// Jira REST client
pub mod jira;

// OAuth handshake
pub mod oauth;

// Server-side session store
pub mod session;
