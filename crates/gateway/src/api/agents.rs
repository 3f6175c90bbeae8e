//! Agent registry endpoints — agents and their immutable version
//! snapshots.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use al_domain::record::AgentVersion;

use crate::state::AppState;

use super::{account_id, api_error};

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enabled_tools: Option<BTreeSet<String>>,
    #[serde(default)]
    pub version_tag: Option<String>,
}

fn build_version(
    req_prompt: String,
    model: Option<String>,
    enabled_tools: Option<BTreeSet<String>>,
    version_tag: Option<String>,
    default_model: &str,
) -> AgentVersion {
    AgentVersion {
        version_id: Uuid::new_v4(),
        agent_id: Uuid::nil(), // set by the store
        system_prompt: req_prompt,
        enabled_tools: enabled_tools.unwrap_or_default(),
        tool_args: Default::default(),
        model: model.unwrap_or_else(|| default_model.to_string()),
        version_tag: version_tag.unwrap_or_else(|| "v1".to_string()),
        created_at: chrono::Utc::now(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "agent name must not be empty");
    }
    let version = build_version(
        req.system_prompt,
        req.model,
        req.enabled_tools,
        req.version_tag,
        &state.config.llm.default_model,
    );
    match state
        .store
        .agents
        .create(account_id(&headers), req.name, version)
    {
        Ok(agent) => Json(serde_json::json!(agent)).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let agents = state.store.agents.list_by_account(&account_id(&headers));
    Json(serde_json::json!({ "agents": agents, "count": agents.len() }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/agents/:agent_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(agent) = state.store.agents.get(&agent_id) else {
        return api_error(StatusCode::NOT_FOUND, "agent not found");
    };
    let current = state.store.agents.get_version(&agent.current_version_id);
    let versions = state.store.agents.versions_of(&agent_id);
    Json(serde_json::json!({
        "agent": agent,
        "current_version": current,
        "version_count": versions.len(),
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agents/:agent_id/versions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AddVersionRequest {
    pub system_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enabled_tools: Option<BTreeSet<String>>,
    pub version_tag: String,
}

pub async fn add_version(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    Json(req): Json<AddVersionRequest>,
) -> impl IntoResponse {
    let version = build_version(
        req.system_prompt,
        req.model,
        req.enabled_tools,
        Some(req.version_tag),
        &state.config.llm.default_model,
    );
    match state.store.agents.add_version(&agent_id, version) {
        Ok(version_id) => Json(serde_json::json!({ "version_id": version_id })).into_response(),
        Err(al_domain::error::Error::NotFound(what)) => api_error(StatusCode::NOT_FOUND, what),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
