//! Forwarded Jira operations.
//!
//! Parameters are checked before the session, so a request that is both
//! unauthenticated and malformed reports the missing parameter.

use super::RelayAppState;
use crate::error::RelayError;
use crate::gateway::{required_param, CreatedTicket, NewTicket};
use crate::jira::{IssueType, Project};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct IssueTypesQuery {
    #[serde(rename = "projectKey")]
    project_key: Option<String>,
}

fn require_session(state: &RelayAppState, jar: &CookieJar) -> Result<String, RelayError> {
    state
        .session_cookie
        .session_id(jar)
        .ok_or(RelayError::NotAuthenticated)
}

pub(super) fn routes() -> Router<Arc<RelayAppState>> {
    Router::new()
        .route("/api/projects", get(list_projects))
        .route("/api/issue-types", get(list_issue_types))
        .route("/api/create-ticket", post(create_ticket))
}

/// GET /api/projects
async fn list_projects(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<Project>>, RelayError> {
    let session_id = require_session(&state, &jar)?;
    let projects = state.gateway.list_projects(&session_id).await?;
    Ok(Json(projects))
}

/// GET /api/issue-types?projectKey=PROJ
async fn list_issue_types(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
    Query(query): Query<IssueTypesQuery>,
) -> Result<Json<Vec<IssueType>>, RelayError> {
    let project_key = required_param(query.project_key.as_deref(), "projectKey")?;
    let session_id = require_session(&state, &jar)?;
    let issue_types = state
        .gateway
        .list_issue_types(&session_id, Some(project_key))
        .await?;
    Ok(Json(issue_types))
}

/// POST /api/create-ticket
async fn create_ticket(
    State(state): State<Arc<RelayAppState>>,
    jar: CookieJar,
    Json(ticket): Json<NewTicket>,
) -> Result<Json<CreatedTicket>, RelayError> {
    ticket.fields()?;
    let session_id = require_session(&state, &jar)?;
    let created = state.gateway.create_ticket(&session_id, ticket).await?;
    Ok(Json(created))
}
