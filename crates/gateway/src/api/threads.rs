//! Thread and message endpoints.
//!
//! - `POST /v1/threads`                     — create a thread (and project when absent)
//! - `GET  /v1/threads`                     — list the account's threads (sidebar)
//! - `GET  /v1/thread/:thread_id/messages`  — ordered messages, paged

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use al_domain::record::{ProjectRecord, ThreadRecord};

use crate::state::AppState;

use super::{account_id, api_error};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/threads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, Default)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn create_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreateThreadRequest>>,
) -> impl IntoResponse {
    let account = account_id(&headers);
    let req = body.map(|Json(b)| b).unwrap_or_default();

    let project_id = match req.project_id {
        Some(id) => match state.store.projects.get(&id) {
            Some(_) => id,
            None => return api_error(StatusCode::NOT_FOUND, format!("project {id} not found")),
        },
        None => {
            let name = req.name.clone().unwrap_or_else(|| "untitled".to_string());
            let project = ProjectRecord::new(&account, name);
            match state.store.projects.insert(project) {
                Ok(id) => id,
                Err(e) => {
                    return api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("failed to create project: {e}"),
                    )
                }
            }
        }
    };

    let thread = ThreadRecord::new(project_id, &account);
    match state.store.threads.insert(thread.clone()) {
        Ok(thread_id) => Json(serde_json::json!({
            "thread_id": thread_id,
            "project_id": project_id,
            "account_id": thread.account_id,
            "created_at": thread.created_at,
        }))
        .into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to create thread: {e}"),
        ),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/threads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let account = account_id(&headers);
    let threads = state.store.threads.list_by_account(&account);
    Json(serde_json::json!({
        "threads": threads,
        "count": threads.len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/thread/:thread_id/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Return messages created strictly before this timestamp.
    #[serde(default)]
    pub before: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_limit() -> usize {
    100
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Query(q): Query<MessagesQuery>,
) -> impl IntoResponse {
    if state.store.threads.get(&thread_id).is_none() {
        return api_error(StatusCode::NOT_FOUND, "thread not found");
    }
    let limit = q.limit.min(500);
    let messages = state.store.messages.page(&thread_id, limit, q.before);
    Json(serde_json::json!({
        "thread_id": thread_id,
        "messages": messages,
        "count": messages.len(),
    }))
    .into_response()
}
