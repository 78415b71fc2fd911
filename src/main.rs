use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use chrono::Duration;
use jira_relay::api::{create_router, RelayAppState, SessionCookie};
use jira_relay::config::RelayConfig;
use jira_relay::gateway::Gateway;
use jira_relay::jira::JiraClient;
use jira_relay::oauth::{HandshakeManager, OAuthProviderConfig, TokenClient};
use jira_relay::session::{run_session_cleanup, InMemorySessionStore, SessionLocks, SessionStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jira_relay=info,tower_http=info".into()),
        )
        .init();

    info!("Jira relay starting...");

    let config = RelayConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    info!(
        bind_addr = %config.server.bind_addr,
        redirect_uri = %config.oauth.redirect_uri,
        api_base_url = %config.jira.api_base_url,
        "Configuration loaded"
    );

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("jira-relay/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(config.http.timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    // Session store and its idle sweeper
    let store = InMemorySessionStore::new(Duration::minutes(config.session.ttl_minutes));
    tokio::spawn(run_session_cleanup(
        store.clone(),
        config.session.cleanup_interval_seconds,
    ));
    let sessions: Arc<dyn SessionStore> = Arc::new(store);
    let locks = SessionLocks::new();

    let provider = OAuthProviderConfig::from_config(&config.oauth);
    let tokens = TokenClient::new(http_client.clone(), provider.clone());
    let jira = JiraClient::new(http_client, config.jira.api_base_url.clone());

    let handshake = HandshakeManager::new(
        provider,
        tokens.clone(),
        jira.clone(),
        sessions.clone(),
        locks.clone(),
    )
    .with_state_expiry(Duration::seconds(config.oauth.state_expiry_seconds));
    let gateway = Gateway::new(sessions, locks, tokens, jira);

    let state = RelayAppState {
        handshake: Arc::new(handshake),
        gateway: Arc::new(gateway),
        session_cookie: SessionCookie::from_config(&config.session),
    };

    let mut app = create_router(state).layer(TraceLayer::new_for_http());

    if let Some(origin) = &config.server.cors_origin {
        let origin: HeaderValue = origin
            .parse()
            .with_context(|| format!("Invalid CORS origin {}", origin))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        );
        info!("CORS enabled for front-end origin");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(addr = %config.server.bind_addr, "Jira relay listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
