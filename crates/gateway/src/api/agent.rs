//! Agent execution endpoints.
//!
//! - `POST /v1/thread/:thread_id/agent/start` — start a run
//! - `POST /v1/agent-run/:run_id/stop`        — request a cooperative stop
//! - `GET  /v1/agent-run/:run_id`             — run record
//! - `GET  /v1/agent-run/:run_id/stream`      — SSE event stream with replay

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use al_domain::chat::ToolCallStyle;
use al_domain::error::Error;
use al_domain::event::{EventPayload, RunEvent};

use crate::runtime::controller::{self, StartRequest};
use crate::state::AppState;

use super::{account_id, api_error};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/thread/:thread_id/agent/start
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct StartAgentRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub tool_call_style: Option<ToolCallStyle>,
    #[serde(default)]
    pub agent_id: Option<Uuid>,
}

pub async fn start_agent(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<StartAgentRequest>,
) -> impl IntoResponse {
    if req.message.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let start = StartRequest {
        thread_id,
        account_id: account_id(&headers),
        message: req.message,
        model: req.model,
        enable_thinking: req.enable_thinking,
        reasoning_effort: req.reasoning_effort,
        tool_call_style: req.tool_call_style.unwrap_or_default(),
        agent_id: req.agent_id,
    };

    match controller::start_run(&state, start) {
        Ok(run_id) => Json(serde_json::json!({
            "run_id": run_id,
            "status": "running",
        }))
        .into_response(),
        Err(Error::NotFound(what)) => api_error(StatusCode::NOT_FOUND, what),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agent-run/:run_id/stop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn stop_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> impl IntoResponse {
    if controller::stop_run(&state, run_id) {
        Json(serde_json::json!({ "ok": true })).into_response()
    } else {
        api_error(StatusCode::NOT_FOUND, "run not found")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/agent-run/:run_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.runs.get(&run_id) {
        Some(run) => Json(serde_json::json!(run)).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "run not found"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/agent-run/:run_id/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Replay starts after this sequence number.
    #[serde(default)]
    pub from_seq: u64,
}

pub async fn stream_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(q): Query<StreamQuery>,
) -> impl IntoResponse {
    let Some(run) = state.store.runs.get(&run_id) else {
        let stream = futures_util::stream::once(async {
            Ok::<_, std::convert::Infallible>(
                Event::default()
                    .event("error")
                    .data(r#"{"error":"run not found"}"#),
            )
        });
        return Sse::new(stream.boxed())
            .keep_alive(KeepAlive::default())
            .into_response();
    };

    // A terminal run whose log has already expired: synthesize the
    // terminal status so the client still observes the run's end.
    if run.status.is_terminal() && state.bus.replay(run_id, 0).is_empty() {
        let event = RunEvent {
            run_id,
            seq: q.from_seq + 1,
            created_at: run.ended_at.unwrap_or(run.started_at),
            payload: EventPayload::Status {
                state: run.status,
                kind: None,
                error: run.error.clone(),
            },
        };
        let stream = futures_util::stream::once(async move {
            Ok::<_, std::convert::Infallible>(sse_frame(&event))
        });
        return Sse::new(stream.boxed())
            .keep_alive(KeepAlive::default())
            .into_response();
    }

    let stream = state
        .bus
        .subscribe(run_id, q.from_seq)
        .map(|event| Ok::<_, std::convert::Infallible>(sse_frame(&event)));

    Sse::new(stream.boxed())
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn sse_frame(event: &RunEvent) -> Event {
    let name = match &event.payload {
        EventPayload::AssistantDelta { .. } => "assistant_delta",
        EventPayload::AssistantFinal { .. } => "assistant_final",
        EventPayload::ToolCall { .. } => "tool_call",
        EventPayload::ToolResult { .. } => "tool_result",
        EventPayload::Status { .. } => "status",
        EventPayload::Error { .. } => "error",
    };
    Event::default()
        .event(name)
        .data(serde_json::to_string(event).unwrap_or_default())
}
