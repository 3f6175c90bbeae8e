//! Live WebSocket channel.
//!
//! `GET /v1/run_live/:app/:user/:session` upgrades to a bidirectional
//! socket: inbound frames are validated [`LiveRequest`]s (text) or raw
//! audio chunks (binary, acknowledged but not transcribed here);
//! outbound frames are the serialized run events of any run started on
//! this socket.
//!
//! Close codes: 1002 for validation failures (including unknown
//! sessions), 1011 for internal errors. Close reasons are capped at
//! 123 bytes per RFC 6455.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use al_domain::chat::ToolCallStyle;

use crate::runtime::controller::{self, StartRequest};
use crate::state::AppState;

/// RFC 6455 limits close reasons to 123 bytes.
fn cap_close_reason(reason: &str) -> String {
    let mut end = reason.len().min(123);
    while !reason.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    reason[..end].to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveRequest {
    /// Start a run from a user message.
    Message {
        text: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// Stop a run started on this socket.
    Stop { run_id: Uuid },
}

pub async fn run_live(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, app, user, session))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    app: String,
    user: String,
    session: String,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // The session segment addresses an existing thread.
    let thread_id = match session.parse::<Uuid>().ok().filter(|id| {
        state.store.threads.get(id).is_some()
    }) {
        Some(id) => id,
        None => {
            let _ = ws_sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::PROTOCOL,
                    reason: cap_close_reason("Session not found").into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(app = %app, user = %user, thread_id = %thread_id, "live channel connected");

    // Outbound events funnel through a channel so run-event forwarders
    // and request acks share one writer.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if ws_sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        ws_sink
    });

    let mut close_frame: Option<CloseFrame<'static>> = None;

    while let Some(frame) = ws_stream.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(_) => break,
        };
        match frame {
            Message::Text(text) => {
                let request: LiveRequest = match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(e) => {
                        close_frame = Some(CloseFrame {
                            code: close_code::PROTOCOL,
                            reason: cap_close_reason(&format!("invalid LiveRequest: {e}")).into(),
                        });
                        break;
                    }
                };
                match request {
                    LiveRequest::Message { text, model } => {
                        let start = StartRequest {
                            thread_id,
                            account_id: user.clone(),
                            message: text,
                            model,
                            enable_thinking: false,
                            reasoning_effort: None,
                            tool_call_style: ToolCallStyle::default(),
                            agent_id: None,
                        };
                        match controller::start_run(&state, start) {
                            Ok(run_id) => {
                                let _ = outbound_tx
                                    .send(
                                        serde_json::json!({
                                            "type": "run_started",
                                            "run_id": run_id,
                                        })
                                        .to_string(),
                                    )
                                    .await;
                                // Forward the run's events onto the socket.
                                let mut events = state.bus.subscribe(run_id, 0);
                                let tx = outbound_tx.clone();
                                tokio::spawn(async move {
                                    while let Some(event) = events.next().await {
                                        let json = serde_json::to_string(&event)
                                            .unwrap_or_default();
                                        if tx.send(json).await.is_err() {
                                            break;
                                        }
                                    }
                                });
                            }
                            Err(e) => {
                                close_frame = Some(CloseFrame {
                                    code: close_code::ERROR,
                                    reason: cap_close_reason(&e.to_string()).into(),
                                });
                                break;
                            }
                        }
                    }
                    LiveRequest::Stop { run_id } => {
                        controller::stop_run(&state, run_id);
                        let _ = outbound_tx
                            .send(
                                serde_json::json!({
                                    "type": "stop_requested",
                                    "run_id": run_id,
                                })
                                .to_string(),
                            )
                            .await;
                    }
                }
            }
            Message::Binary(data) => {
                // Audio chunks are accepted and acknowledged; the
                // transcription adapter lives outside this service.
                let _ = outbound_tx
                    .send(
                        serde_json::json!({
                            "type": "audio_ack",
                            "bytes": data.len(),
                        })
                        .to_string(),
                    )
                    .await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    drop(outbound_tx);
    if let Ok(mut sink) = writer.await {
        if let Some(frame) = close_frame {
            let _ = sink.send(Message::Close(Some(frame))).await;
        } else {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
    tracing::info!(thread_id = %thread_id, "live channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reason_is_capped_at_123_bytes() {
        let long = "x".repeat(500);
        assert_eq!(cap_close_reason(&long).len(), 123);
        assert_eq!(cap_close_reason("short"), "short");
    }

    #[test]
    fn close_reason_respects_char_boundaries() {
        // 62 two-byte chars = 124 bytes; the cap must land on a boundary.
        let s = "\u{00e9}".repeat(62);
        let capped = cap_close_reason(&s);
        assert!(capped.len() <= 123);
        assert!(capped.is_char_boundary(capped.len()));
    }

    #[test]
    fn live_request_parses_both_variants() {
        let msg: LiveRequest =
            serde_json::from_str(r#"{"type": "message", "text": "hi"}"#).unwrap();
        assert!(matches!(msg, LiveRequest::Message { .. }));

        let run_id = Uuid::new_v4();
        let stop: LiveRequest = serde_json::from_str(&format!(
            r#"{{"type": "stop", "run_id": "{run_id}"}}"#
        ))
        .unwrap();
        assert!(matches!(stop, LiveRequest::Stop { .. }));

        assert!(serde_json::from_str::<LiveRequest>(r#"{"type": "bogus"}"#).is_err());
    }
}
