pub mod agent;
pub mod agents;
pub mod auth;
pub mod flags;
pub mod health;
pub mod live;
pub mod threads;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Account scoping header; absent means the single-tenant default.
pub(crate) fn account_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-account-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("default")
        .to_string()
}

/// Build the full API router.
///
/// Routes are split into **public** (health) and **protected** (gated
/// behind the bearer-token middleware when a token is configured).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        // Threads & messages
        .route("/v1/threads", post(threads::create_thread))
        .route("/v1/threads", get(threads::list_threads))
        .route("/v1/thread/:thread_id/messages", get(threads::get_messages))
        // Agent execution
        .route(
            "/v1/thread/:thread_id/agent/start",
            post(agent::start_agent),
        )
        .route("/v1/agent-run/:run_id", get(agent::get_run))
        .route("/v1/agent-run/:run_id/stop", post(agent::stop_run))
        .route("/v1/agent-run/:run_id/stream", get(agent::stream_run))
        // Live channel
        .route("/v1/run_live/:app/:user/:session", get(live::run_live))
        // Agents & versions
        .route("/v1/agents", post(agents::create_agent))
        .route("/v1/agents", get(agents::list_agents))
        .route("/v1/agents/:agent_id", get(agents::get_agent))
        .route("/v1/agents/:agent_id/versions", post(agents::add_version))
        // Feature flags
        .route("/v1/flags", get(flags::list_flags))
        .route("/v1/flags/:name", get(flags::get_flag))
        .route("/v1/flags/:name", put(flags::set_flag))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
