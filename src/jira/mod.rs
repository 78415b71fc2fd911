//! HTTP client for the Atlassian API gateway.
//!
//! Covers the accessible-resources lookup used during the handshake and the
//! three Jira Cloud REST v3 calls the relay forwards. Every call is a single
//! attempt; non-2xx responses become [`RelayError::Upstream`].

mod document;
mod types;

pub use document::paragraph_document;
pub use types::{
    CreateIssueRequest, CreatedIssue, IssueFields, IssueType, IssueTypeRef, Project, ProjectRef,
};

use crate::credentials::CloudSite;
use crate::error::{RelayError, UpstreamError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use types::ProjectDetail;

/// Jira REST client. Holds no credentials; callers pass the bearer token.
#[derive(Clone)]
pub struct JiraClient {
    http_client: Client,
    api_base_url: String,
}

impl JiraClient {
    /// `api_base_url` is `https://api.atlassian.com` in production and a mock
    /// server URL in tests.
    pub fn new(http_client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn rest_url(&self, cloud_id: &str, path: &str) -> String {
        format!(
            "{}/ex/jira/{}/rest/api/3{}",
            self.api_base_url,
            urlencoding::encode(cloud_id),
            path
        )
    }

    /// Sites the token has been granted access to.
    pub async fn accessible_resources(&self, access_token: &str) -> Result<Vec<CloudSite>, RelayError> {
        let url = format!("{}/oauth/token/accessible-resources", self.api_base_url);
        debug!("Fetching accessible resources");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        parse_response(response).await
    }

    /// `GET /project`
    pub async fn list_projects(&self, access_token: &str, cloud_id: &str) -> Result<Vec<Project>, RelayError> {
        let url = self.rest_url(cloud_id, "/project");
        debug!(cloud_id = %cloud_id, "Fetching projects");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        parse_response(response).await
    }

    /// Issue types from `GET /project/{key}`.
    pub async fn project_issue_types(
        &self,
        access_token: &str,
        cloud_id: &str,
        project_key: &str,
    ) -> Result<Vec<IssueType>, RelayError> {
        let path = format!("/project/{}", urlencoding::encode(project_key));
        let url = self.rest_url(cloud_id, &path);
        debug!(cloud_id = %cloud_id, project = %project_key, "Fetching project issue types");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let detail: ProjectDetail = parse_response(response).await?;
        Ok(detail.issue_types)
    }

    /// `POST /issue`
    pub async fn create_issue(
        &self,
        access_token: &str,
        cloud_id: &str,
        request: &CreateIssueRequest,
    ) -> Result<CreatedIssue, RelayError> {
        let url = self.rest_url(cloud_id, "/issue");
        debug!(
            cloud_id = %cloud_id,
            project = %request.fields.project.key,
            "Creating issue"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        parse_response(response).await
    }
}

/// Maps non-2xx to an upstream error carrying the provider's message, then
/// decodes the body.
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RelayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::Upstream(UpstreamError::from_body(
            status.as_u16(),
            &body,
        )));
    }

    response.json::<T>().await.map_err(|e| {
        RelayError::Upstream(UpstreamError {
            status: status.as_u16(),
            message: format!("Invalid response from Jira: {}", e),
            details: None,
        })
    })
}
