use serde::{Deserialize, Serialize};

/// Jira project, reshaped to the fields the front-end uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
}

/// Issue type available in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Subset of `GET /project/{key}` the relay reads.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectDetail {
    #[serde(rename = "issueTypes", default)]
    pub issue_types: Vec<IssueType>,
}

/// `POST /issue` payload.
#[derive(Debug, Serialize)]
pub struct CreateIssueRequest {
    pub fields: IssueFields,
}

#[derive(Debug, Serialize)]
pub struct IssueFields {
    pub project: ProjectRef,
    pub summary: String,
    pub description: serde_json::Value,
    #[serde(rename = "issuetype")]
    pub issue_type: IssueTypeRef,
}

#[derive(Debug, Serialize)]
pub struct ProjectRef {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct IssueTypeRef {
    pub name: String,
}

/// `POST /issue` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}
