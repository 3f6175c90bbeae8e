use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureKind;

/// Lifecycle status of an agent run.
///
/// Transitions: `running → {completed, stopped, failed}`, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }
}

/// One record on a run's event stream.
///
/// `seq` is assigned by the bus log at append time and is strictly
/// increasing per run with no gaps; subscribers dedupe on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// An attachment referenced from a tool result (file written in the
/// sandbox, generated artifact, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Event payloads, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "assistant_delta")]
    AssistantDelta { text: String },

    #[serde(rename = "assistant_final")]
    AssistantFinal {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<crate::chat::ToolCall>>,
    },

    #[serde(rename = "tool_call")]
    ToolCall {
        call_id: String,
        name: String,
        args: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        success: bool,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attachments: Option<Vec<Attachment>>,
    },

    #[serde(rename = "status")]
    Status {
        state: RunStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<FailureKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "error")]
    Error { message: String, recoverable: bool },
}

impl EventPayload {
    pub fn status(state: RunStatus) -> Self {
        EventPayload::Status {
            state,
            kind: None,
            error: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        EventPayload::Status {
            state: RunStatus::Failed,
            kind: Some(kind),
            error: Some(error.into()),
        }
    }

    /// True when this payload carries a terminal run status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventPayload::Status { state, .. } if state.is_terminal())
    }
}
