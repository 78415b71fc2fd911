use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Complete relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Origin allowed to call the API with credentials (the front-end)
    #[serde(default)]
    pub cors_origin: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origin: None,
        }
    }
}

/// Atlassian OAuth 2.0 (3LO) app configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// How long a pending CSRF state stays valid (seconds)
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/auth/jira/callback".to_string()
}

fn default_auth_url() -> String {
    "https://auth.atlassian.com/authorize".to_string()
}

fn default_token_url() -> String {
    "https://auth.atlassian.com/oauth/token".to_string()
}

fn default_audience() -> String {
    "api.atlassian.com".to_string()
}

fn default_scopes() -> Vec<String> {
    ["read:jira-work", "write:jira-work", "read:jira-user", "offline_access"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_state_expiry() -> i64 {
    600
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            audience: default_audience(),
            scopes: default_scopes(),
            state_expiry_seconds: default_state_expiry(),
        }
    }
}

/// Jira REST API location
#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    /// Base of the Atlassian API gateway; accessible-resources and the
    /// per-cloud REST endpoints are resolved against it.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    "https://api.atlassian.com".to_string()
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
        }
    }
}

/// Server-side session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Idle time after which a session is swept
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_name() -> String {
    "relay_session".to_string()
}

fn default_ttl_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_minutes: default_ttl_minutes(),
            cleanup_interval_seconds: default_cleanup_interval(),
            secure_cookie: false,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            oauth: OAuthConfig::default(),
            jira: JiraConfig::default(),
            session: SessionConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Loads `RELAY_CONFIG` (if set) and then applies env var overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("RELAY_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Applies `RELAY_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("RELAY_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("RELAY_CORS_ORIGIN") {
            self.server.cors_origin = Some(v);
        }
        if let Some(v) = lookup("RELAY_OAUTH_CLIENT_ID") {
            self.oauth.client_id = v;
        }
        if let Some(v) = lookup("RELAY_OAUTH_CLIENT_SECRET") {
            self.oauth.client_secret = v;
        }
        if let Some(v) = lookup("RELAY_OAUTH_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Some(v) = lookup("RELAY_SESSION_TTL_MINUTES") {
            self.session.ttl_minutes = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid RELAY_SESSION_TTL_MINUTES value {:?}", v))?;
        }
        Ok(())
    }

    /// Rejects configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.is_empty() {
            bail!("OAuth client id is not configured (set RELAY_OAUTH_CLIENT_ID)");
        }
        if self.oauth.client_secret.is_empty() {
            bail!("OAuth client secret is not configured (set RELAY_OAUTH_CLIENT_SECRET)");
        }
        if self.session.ttl_minutes <= 0 {
            bail!("session.ttl_minutes must be positive");
        }
        if self.session.cleanup_interval_seconds == 0 {
            bail!("session.cleanup_interval_seconds must be positive");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<RelayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: RelayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
