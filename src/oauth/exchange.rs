//! Token endpoint calls: authorization-code exchange and refresh.

use super::provider::OAuthProviderConfig;
use crate::credentials::TokenGrant;
use crate::error::{RelayError, UpstreamError};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Authorization code exchange request
#[derive(Serialize)]
struct CodeExchangeRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

/// Refresh token request
#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Client for the provider's token endpoint.
#[derive(Clone)]
pub struct TokenClient {
    http_client: reqwest::Client,
    provider: OAuthProviderConfig,
}

impl TokenClient {
    pub fn new(http_client: reqwest::Client, provider: OAuthProviderConfig) -> Self {
        Self {
            http_client,
            provider,
        }
    }

    /// Exchange authorization code for access and refresh tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, RelayError> {
        let body = CodeExchangeRequest {
            grant_type: "authorization_code",
            client_id: &self.provider.client_id,
            client_secret: &self.provider.client_secret,
            code,
            redirect_uri: &self.provider.redirect_uri,
        };

        tracing::debug!("Exchanging authorization code for token at {}", self.provider.token_url);

        self.request_token(&body)
            .await
            .map_err(|e| RelayError::TokenExchangeFailed(format!("{:#}", e)))
    }

    /// Mint a new token pair from a refresh token.
    ///
    /// Atlassian refresh tokens rotate: a response without a new refresh
    /// token is treated as a failure rather than reusing the old one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RelayError> {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            client_id: &self.provider.client_id,
            client_secret: &self.provider.client_secret,
            refresh_token,
        };

        tracing::debug!("Refreshing access token at {}", self.provider.token_url);

        self.request_token(&body)
            .await
            .map_err(|e| RelayError::TokenRefreshFailed(format!("{:#}", e)))
    }

    async fn request_token<B: Serialize>(&self, body: &B) -> Result<TokenGrant> {
        let response = self
            .http_client
            .post(&self.provider.token_url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let upstream = UpstreamError::from_body(status.as_u16(), &body);
            return Err(anyhow!(
                "Token endpoint returned {}: {}",
                status,
                upstream.message
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        tracing::debug!(
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = token_response.expires_in,
            "Token request successful"
        );

        let refresh_token = token_response
            .refresh_token
            .ok_or_else(|| anyhow!("Token response did not include a refresh token"))?;

        let expires_in = token_response.expires_in;
        TokenGrant::new(
            token_response.access_token,
            refresh_token,
            expires_in,
            Utc::now(),
        )
        .ok_or_else(|| anyhow!("Token response has an out-of-range expires_in: {}", expires_in))
    }
}
