// Integration tests for the OAuth handshake against a mock Atlassian server

use chrono::Duration;
use jira_relay::credentials::CloudSite;
use jira_relay::error::RelayError;
use jira_relay::jira::JiraClient;
use jira_relay::oauth::{CallbackParams, HandshakeManager, OAuthProviderConfig, SiteSelector, TokenClient};
use jira_relay::session::{InMemorySessionStore, PendingState, SessionData, SessionLocks, SessionStore};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;

const SESSION: &str = "session-1";

fn provider(server: &ServerGuard) -> OAuthProviderConfig {
    OAuthProviderConfig {
        auth_url: format!("{}/authorize", server.url()),
        token_url: format!("{}/oauth/token", server.url()),
        audience: "api.atlassian.com".to_string(),
        scopes: vec![
            "read:jira-work".to_string(),
            "write:jira-work".to_string(),
            "read:jira-user".to_string(),
            "offline_access".to_string(),
        ],
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://localhost:3000/auth/jira/callback".to_string(),
    }
}

fn create_manager(server: &ServerGuard) -> (HandshakeManager, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new(Duration::minutes(30)));
    let provider = provider(server);
    let http = reqwest::Client::new();
    let manager = HandshakeManager::new(
        provider.clone(),
        TokenClient::new(http.clone(), provider),
        JiraClient::new(http, server.url()),
        store.clone(),
        SessionLocks::new(),
    );
    (manager, store)
}

async fn bind_state(store: &InMemorySessionStore, value: &str) {
    let data = SessionData {
        pending_state: Some(PendingState::new(value.to_string())),
        ..SessionData::default()
    };
    store.set(SESSION, data).await.unwrap();
}

fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
    CallbackParams {
        code: code.map(String::from),
        state: state.map(String::from),
        ..CallbackParams::default()
    }
}

async fn mock_token_exchange(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::PartialJson(json!({
            "grant_type": "authorization_code",
            "code": "abc"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"A","refresh_token":"R","expires_in":3600}"#)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_resources(server: &mut ServerGuard, body: &str, hits: usize) -> Mock {
    server
        .mock("GET", "/oauth/token/accessible-resources")
        .match_header("authorization", "Bearer A")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(hits)
        .create_async()
        .await
}

const ONE_SITE: &str =
    r#"[{"id":"cloud1","name":"MySite","url":"https://mysite.atlassian.net","scopes":[]}]"#;

/// Matching state → token exchange → discovery → record scoped to the first site.
#[tokio::test]
async fn test_end_to_end_handshake() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 1).await;
    let resources_mock = mock_resources(&mut server, ONE_SITE, 1).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let credentials = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap();

    token_mock.assert_async().await;
    resources_mock.assert_async().await;

    assert_eq!(credentials.site().id, "cloud1");
    assert_eq!(credentials.site().name, "MySite");
    assert_eq!(credentials.site().url, "https://mysite.atlassian.net");
    assert_eq!(credentials.access_token(), "A");
    assert_eq!(credentials.refresh_token(), "R");

    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.pending_state.is_none());
    assert_eq!(session.credentials.unwrap().site().id, "cloud1");
}

/// Missing state is rejected before any call to Atlassian.
#[tokio::test]
async fn test_missing_state_rejected_without_network() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let resources_mock = mock_resources(&mut server, ONE_SITE, 0).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), None))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::CsrfMismatch));
    token_mock.assert_async().await;
    resources_mock.assert_async().await;

    // The pending state is gone even though the callback failed
    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.pending_state.is_none());
    assert!(session.credentials.is_none());
}

/// Mismatched state is rejected before any call to Atlassian.
#[tokio::test]
async fn test_mismatched_state_rejected_without_network() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let resources_mock = mock_resources(&mut server, ONE_SITE, 0).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("forged")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::CsrfMismatch));
    token_mock.assert_async().await;
    resources_mock.assert_async().await;
}

/// A callback for a session that never started a handshake is a CSRF mismatch.
#[tokio::test]
async fn test_unknown_session_rejected() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let (manager, store) = create_manager(&server);

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::CsrfMismatch));
    assert!(store.get(SESSION).await.unwrap().is_none());
    token_mock.assert_async().await;
}

/// Replaying the same (code, state) fails: the state was consumed.
#[tokio::test]
async fn test_state_is_single_use() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 1).await;
    let _resources_mock = mock_resources(&mut server, ONE_SITE, 1).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap();

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::CsrfMismatch));
    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_code_rejected_after_state_check() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(None, Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::MissingAuthorizationCode));
    token_mock.assert_async().await;

    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.pending_state.is_none());
}

#[tokio::test]
async fn test_provider_error_reported_as_denied() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let params = CallbackParams {
        state: Some("s1".to_string()),
        error: Some("access_denied".to_string()),
        error_description: Some("User cancelled".to_string()),
        ..CallbackParams::default()
    };

    let err = manager.complete(SESSION, params).await.unwrap_err();

    match err {
        RelayError::AuthorizationDenied(msg) => {
            assert!(msg.contains("access_denied"));
            assert!(msg.contains("User cancelled"));
        }
        other => panic!("expected AuthorizationDenied, got {:?}", other),
    }
    token_mock.assert_async().await;
}

/// Empty accessible-resources list: no record is stored.
#[tokio::test]
async fn test_no_accessible_resources() {
    let mut server = Server::new_async().await;
    let _token_mock = mock_token_exchange(&mut server, 1).await;
    let _resources_mock = mock_resources(&mut server, "[]", 1).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::NoAccessibleResources));
    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.credentials.is_none());
}

/// Rejected code exchange: no record, no discovery call.
#[tokio::test]
async fn test_token_exchange_failure_stores_nothing() {
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/oauth/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#)
        .create_async()
        .await;
    let resources_mock = mock_resources(&mut server, ONE_SITE, 0).await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::TokenExchangeFailed(_)));
    resources_mock.assert_async().await;
    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.credentials.is_none());
}

/// Discovery failure after a good exchange: no partial record.
#[tokio::test]
async fn test_discovery_failure_stores_nothing() {
    let mut server = Server::new_async().await;
    let _token_mock = mock_token_exchange(&mut server, 1).await;
    let _resources_mock = server
        .mock("GET", "/oauth/token/accessible-resources")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;
    let (manager, store) = create_manager(&server);

    bind_state(&store, "s1").await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Upstream(_)));
    let session = store.get(SESSION).await.unwrap().unwrap();
    assert!(session.credentials.is_none());
}

#[tokio::test]
async fn test_initiate_binds_state_and_builds_url() {
    let server = Server::new_async().await;
    let (manager, store) = create_manager(&server);

    let url = manager.initiate(SESSION).await.unwrap();
    let first = store
        .get(SESSION)
        .await
        .unwrap()
        .unwrap()
        .pending_state
        .unwrap();

    assert!(url.starts_with(&format!("{}/authorize?", server.url())));
    assert!(url.contains(&format!("state={}", first.value)));
    assert!(url.contains("audience=api.atlassian.com"));
    assert!(url.contains("prompt=consent"));
    assert!(url.contains("offline_access"));

    // A second initiate replaces the pending state
    manager.initiate(SESSION).await.unwrap();
    let second = store
        .get(SESSION)
        .await
        .unwrap()
        .unwrap()
        .pending_state
        .unwrap();
    assert_ne!(first.value, second.value);
}

#[tokio::test]
async fn test_initiated_state_completes_handshake() {
    let mut server = Server::new_async().await;
    let _token_mock = mock_token_exchange(&mut server, 1).await;
    let _resources_mock = mock_resources(&mut server, ONE_SITE, 1).await;
    let (manager, store) = create_manager(&server);

    manager.initiate(SESSION).await.unwrap();
    let state = store
        .get(SESSION)
        .await
        .unwrap()
        .unwrap()
        .pending_state
        .unwrap()
        .value;

    let credentials = manager
        .complete(SESSION, callback(Some("abc"), Some(&state)))
        .await
        .unwrap();
    assert_eq!(credentials.site().id, "cloud1");
}

#[tokio::test]
async fn test_expired_state_rejected() {
    let mut server = Server::new_async().await;
    let token_mock = mock_token_exchange(&mut server, 0).await;
    let (manager, store) = create_manager(&server);
    let manager = manager.with_state_expiry(Duration::milliseconds(10));

    bind_state(&store, "s1").await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let err = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::CsrfMismatch));
    token_mock.assert_async().await;
}

struct SiteNamed(&'static str);

impl SiteSelector for SiteNamed {
    fn select(&self, sites: Vec<CloudSite>) -> Option<CloudSite> {
        sites.into_iter().find(|site| site.name == self.0)
    }
}

/// The site policy is replaceable without touching the handshake.
#[tokio::test]
async fn test_custom_site_selector() {
    let mut server = Server::new_async().await;
    let _token_mock = mock_token_exchange(&mut server, 1).await;
    let _resources_mock = mock_resources(
        &mut server,
        r#"[
            {"id":"cloud1","name":"MySite","url":"https://mysite.atlassian.net"},
            {"id":"cloud2","name":"Other","url":"https://other.atlassian.net"}
        ]"#,
        1,
    )
    .await;
    let (manager, store) = create_manager(&server);
    let manager = manager.with_site_selector(Arc::new(SiteNamed("Other")));

    bind_state(&store, "s1").await;

    let credentials = manager
        .complete(SESSION, callback(Some("abc"), Some("s1")))
        .await
        .unwrap();
    assert_eq!(credentials.site().id, "cloud2");
}
