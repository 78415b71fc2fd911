//! Authenticated request gateway.
//!
//! Every forwarded call first runs [`Gateway::ensure_fresh_token`], which
//! evaluates the record's [`TokenState`] and performs at most one refresh.
//! Refreshes hold the session's [`SessionLocks`] entry, which the handshake
//! and [`Gateway::disconnect`] also take: concurrent requests for the same
//! session wait and then see the refreshed record, so a rotated refresh token
//! is never replayed, and a disconnect is never undone by a refresh.

use crate::credentials::{SessionCredentials, TokenState};
use crate::error::RelayError;
use crate::jira::{
    paragraph_document, CreateIssueRequest, IssueFields, IssueType, IssueTypeRef, JiraClient,
    Project, ProjectRef,
};
use crate::oauth::TokenClient;
use crate::session::{SessionLocks, SessionStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Description used when a ticket is created without one.
pub const DEFAULT_DESCRIPTION: &str = "No description provided";

/// Ticket creation input. All fields are optional on the wire so missing
/// ones surface as [`RelayError::MissingParameter`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub project_key: Option<String>,
    pub issue_type: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

/// Ticket fields after the required ones have been checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TicketFields<'a> {
    pub project_key: &'a str,
    pub issue_type: &'a str,
    pub summary: &'a str,
    pub description: &'a str,
}

impl NewTicket {
    /// Checks `projectKey`, `issueType` and `summary` in that order. A blank
    /// description becomes [`DEFAULT_DESCRIPTION`].
    pub fn fields(&self) -> Result<TicketFields<'_>, RelayError> {
        Ok(TicketFields {
            project_key: required_param(self.project_key.as_deref(), "projectKey")?,
            issue_type: required_param(self.issue_type.as_deref(), "issueType")?,
            summary: required_param(self.summary.as_deref(), "summary")?,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESCRIPTION),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedTicket {
    pub success: bool,
    pub key: String,
    pub id: String,
    pub url: String,
}

/// Connection status for the front-end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

pub struct Gateway {
    sessions: Arc<dyn SessionStore>,
    tokens: TokenClient,
    jira: JiraClient,
    locks: SessionLocks,
}

impl Gateway {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        locks: SessionLocks,
        tokens: TokenClient,
        jira: JiraClient,
    ) -> Self {
        Self {
            sessions,
            locks,
            tokens,
            jira,
        }
    }

    async fn credentials(&self, session_id: &str) -> Result<Option<SessionCredentials>, RelayError> {
        Ok(self
            .sessions
            .get(session_id)
            .await?
            .and_then(|session| session.credentials))
    }

    /// Returns credentials whose access token is valid now, refreshing once
    /// if it has expired.
    ///
    /// A failed refresh removes the credential record from the session and
    /// returns [`RelayError::TokenRefreshFailed`]; the user has to reconnect.
    /// If the session ends while the refresh is in flight, nothing is written.
    pub async fn ensure_fresh_token(&self, session_id: &str) -> Result<SessionCredentials, RelayError> {
        // Sessions without credentials never get a lock entry
        if self.credentials(session_id).await?.is_none() {
            return Err(RelayError::NotAuthenticated);
        }

        let _lock = self.locks.acquire(session_id).await;

        let mut credentials = self
            .credentials(session_id)
            .await?
            .ok_or(RelayError::NotAuthenticated)?;

        match credentials.token_state(Utc::now()) {
            TokenState::Valid => Ok(credentials),
            TokenState::Expired => {
                info!(session = %session_id, "Access token expired, refreshing");

                let outcome = self.tokens.refresh(credentials.refresh_token()).await;

                let Some(mut session) = self.sessions.get(session_id).await? else {
                    warn!(session = %session_id, "Session ended during token refresh, discarding result");
                    return Err(outcome.err().unwrap_or(RelayError::NotAuthenticated));
                };

                match outcome {
                    Ok(grant) => {
                        credentials.apply_refresh(grant);
                        session.credentials = Some(credentials.clone());
                        self.sessions.set(session_id, session).await?;

                        info!(session = %session_id, "OAuth token refreshed successfully");
                        Ok(credentials)
                    }
                    Err(e) => {
                        error!(
                            session = %session_id,
                            error = %e,
                            "Token refresh failed, dropping credentials"
                        );
                        session.credentials = None;
                        self.sessions.set(session_id, session).await?;

                        Err(e)
                    }
                }
            }
        }
    }

    pub async fn status(&self, session_id: &str) -> Result<ConnectionStatus, RelayError> {
        Ok(match self.credentials(session_id).await? {
            Some(creds) => ConnectionStatus {
                connected: true,
                site: Some(creds.site().name.clone()),
                site_url: Some(creds.site().url.clone()),
            },
            None => ConnectionStatus {
                connected: false,
                site: None,
                site_url: None,
            },
        })
    }

    /// Destroys the session and everything in it.
    /// Waits for an in-flight refresh of the same session to finish first.
    pub async fn disconnect(&self, session_id: &str) -> Result<(), RelayError> {
        let _lock = self.locks.acquire(session_id).await;
        self.sessions.destroy(session_id).await?;
        info!(session = %session_id, "Session disconnected");
        Ok(())
    }

    pub async fn list_projects(&self, session_id: &str) -> Result<Vec<Project>, RelayError> {
        let credentials = self.ensure_fresh_token(session_id).await?;

        let projects = self
            .jira
            .list_projects(credentials.access_token(), &credentials.site().id)
            .await
            .map_err(|e| log_upstream(session_id, "list projects", e))?;

        debug!(session = %session_id, count = projects.len(), "Projects fetched");
        Ok(projects)
    }

    pub async fn list_issue_types(
        &self,
        session_id: &str,
        project_key: Option<&str>,
    ) -> Result<Vec<IssueType>, RelayError> {
        let project_key = required_param(project_key, "projectKey")?;
        let credentials = self.ensure_fresh_token(session_id).await?;

        self.jira
            .project_issue_types(credentials.access_token(), &credentials.site().id, project_key)
            .await
            .map_err(|e| log_upstream(session_id, "list issue types", e))
    }

    pub async fn create_ticket(&self, session_id: &str, ticket: NewTicket) -> Result<CreatedTicket, RelayError> {
        let TicketFields {
            project_key,
            issue_type,
            summary,
            description,
        } = ticket.fields()?;

        let credentials = self.ensure_fresh_token(session_id).await?;

        let request = CreateIssueRequest {
            fields: IssueFields {
                project: ProjectRef {
                    key: project_key.to_string(),
                },
                summary: summary.to_string(),
                description: paragraph_document(description),
                issue_type: IssueTypeRef {
                    name: issue_type.to_string(),
                },
            },
        };

        let created = self
            .jira
            .create_issue(credentials.access_token(), &credentials.site().id, &request)
            .await
            .map_err(|e| log_upstream(session_id, "create issue", e))?;

        info!(session = %session_id, key = %created.key, "Ticket created");

        Ok(CreatedTicket {
            success: true,
            url: credentials.browse_url(&created.key),
            key: created.key,
            id: created.id,
        })
    }
}

/// Trimmed value of a required request parameter.
pub fn required_param<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, RelayError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(RelayError::MissingParameter(name))
}

fn log_upstream(session_id: &str, operation: &str, err: RelayError) -> RelayError {
    warn!(session = %session_id, operation = %operation, error = %err, "Jira request failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert!(matches!(
            required_param(None, "summary"),
            Err(RelayError::MissingParameter("summary"))
        ));
        assert!(matches!(
            required_param(Some("   "), "summary"),
            Err(RelayError::MissingParameter("summary"))
        ));
        assert_eq!(required_param(Some(" PROJ "), "projectKey").unwrap(), "PROJ");
    }

    #[test]
    fn test_new_ticket_deserialization() {
        let ticket: NewTicket = serde_json::from_str(
            r#"{"projectKey":"PROJ","issueType":"Task","summary":"Fix bug"}"#,
        )
        .unwrap();
        assert_eq!(ticket.project_key.as_deref(), Some("PROJ"));
        assert_eq!(ticket.issue_type.as_deref(), Some("Task"));
        assert_eq!(ticket.description, None);
    }

    #[test]
    fn test_ticket_fields() {
        let ticket = NewTicket {
            project_key: Some(" PROJ ".to_string()),
            issue_type: Some("Task".to_string()),
            summary: Some("Fix bug".to_string()),
            description: Some("   ".to_string()),
        };
        let fields = ticket.fields().unwrap();
        assert_eq!(fields.project_key, "PROJ");
        assert_eq!(fields.description, DEFAULT_DESCRIPTION);

        let ticket = NewTicket {
            summary: None,
            ..ticket
        };
        assert!(matches!(
            ticket.fields(),
            Err(RelayError::MissingParameter("summary"))
        ));
    }

    #[test]
    fn test_status_serialization() {
        let disconnected = ConnectionStatus {
            connected: false,
            site: None,
            site_url: None,
        };
        assert_eq!(
            serde_json::to_value(&disconnected).unwrap(),
            serde_json::json!({"connected": false})
        );

        let connected = ConnectionStatus {
            connected: true,
            site: Some("MySite".to_string()),
            site_url: Some("https://mysite.atlassian.net".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&connected).unwrap(),
            serde_json::json!({
                "connected": true,
                "site": "MySite",
                "siteUrl": "https://mysite.atlassian.net"
            })
        );
    }
}
