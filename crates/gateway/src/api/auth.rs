//! Bearer-token auth middleware.
//!
//! The token is read once at startup from the configured env var and
//! stored as a SHA-256 digest; requests are compared digest-to-digest.
//! No token configured = dev mode, auth disabled.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::state::AppState;

use super::api_error;

pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token_hash else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if Sha256::digest(token.as_bytes()).as_slice() == expected.as_slice() => {
            next.run(request).await
        }
        _ => api_error(StatusCode::UNAUTHORIZED, "invalid or missing bearer token"),
    }
}
