//! Atlassian OAuth 2.0 (3LO) provider configuration.

use crate::config::OAuthConfig;
use serde::{Deserialize, Serialize};

/// OAuth provider configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token endpoint URL (code exchange and refresh)
    pub token_url: String,

    /// API audience the token is issued for
    pub audience: String,

    /// Requested OAuth scopes
    pub scopes: Vec<String>,

    pub client_id: String,

    pub client_secret: String,

    /// Callback URL registered with the OAuth app
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            audience: config.audience.clone(),
            scopes: config.scopes.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    /// Build authorization URL carrying the CSRF state
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?audience={}&client_id={}&scope={}&redirect_uri={}&state={}&response_type=code&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.audience),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&scopes),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }
}
