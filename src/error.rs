//! Error taxonomy shared by the handshake manager, the gateway and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error reported by Atlassian for a non-2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    /// HTTP status returned by the provider
    pub status: u16,
    /// Short human-readable message
    pub message: String,
    /// Structured detail (`errorMessages` / `errors`) when the provider sent JSON
    pub details: Option<Value>,
}

impl UpstreamError {
    /// Builds an upstream error from a raw response body.
    ///
    /// Jira reports failures as `{"errorMessages": [...], "errors": {...}}`; the
    /// auth service uses `{"error": ..., "error_description": ...}` and some
    /// gateway errors only carry `{"message": ...}`.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("Upstream request failed with status {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        let details = parsed.and_then(|value| {
            let mut detail = serde_json::Map::new();
            for key in ["errorMessages", "errors"] {
                if let Some(v) = value.get(key) {
                    detail.insert(key.to_string(), v.clone());
                }
            }
            if detail.is_empty() {
                None
            } else {
                Some(Value::Object(detail))
            }
        });

        Self {
            status,
            message,
            details,
        }
    }
}

fn extract_message(value: &Value) -> Option<String> {
    if let Some(first) = value
        .get("errorMessages")
        .and_then(|v| v.as_array())
        .and_then(|messages| messages.first())
        .and_then(|m| m.as_str())
    {
        return Some(first.to_string());
    }

    if let Some(errors) = value.get("errors").and_then(|v| v.as_object()) {
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg.as_str().unwrap_or_default()))
                .collect::<Vec<_>>()
                .join("; ");
            return Some(joined);
        }
    }

    for key in ["error_description", "message", "error"] {
        if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }

    None
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid or expired OAuth state (possible CSRF attack)")]
    CsrfMismatch,

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("No accessible Jira sites for this account")]
    NoAccessibleResources,

    #[error("Failed to exchange authorization code: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed, please reconnect: {0}")]
    TokenRefreshFailed(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Jira API error: {0}")]
    Upstream(UpstreamError),

    #[error("Not connected to Jira")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Session store error: {0}")]
    SessionStore(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::CsrfMismatch => StatusCode::FORBIDDEN,
            RelayError::MissingAuthorizationCode
            | RelayError::MissingParameter(_)
            | RelayError::AuthorizationDenied(_) => StatusCode::BAD_REQUEST,
            RelayError::NotAuthenticated | RelayError::TokenRefreshFailed(_) => {
                StatusCode::UNAUTHORIZED
            }
            RelayError::NoAccessibleResources => StatusCode::NOT_FOUND,
            RelayError::Upstream(upstream) => match StatusCode::from_u16(upstream.status) {
                Ok(status) if status.is_client_error() => status,
                _ => StatusCode::BAD_GATEWAY,
            },
            RelayError::TokenExchangeFailed(_) | RelayError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::SessionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the user has to go through the OAuth handshake again.
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            RelayError::NotAuthenticated | RelayError::TokenRefreshFailed(_)
        )
    }
}

/// JSON error payload returned by the relay API
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reconnect: bool,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reconnect = self.requires_reconnect();

        let (error, details) = match self {
            RelayError::Upstream(upstream) => (upstream.message, upstream.details),
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error,
            details,
            reconnect,
        });

        (status, body).into_response()
    }
}
