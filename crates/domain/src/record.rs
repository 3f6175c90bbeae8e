//! Persistent rows: threads, messages, projects, runs, agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::event::RunStatus;
use crate::stream::Usage;

/// A conversation scope. Created on first message; owned by `account_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: Uuid,
    pub project_id: Uuid,
    pub account_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ThreadRecord {
    pub fn new(project_id: Uuid, account_id: impl Into<String>) -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            project_id,
            account_id: account_id.into(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }
}

/// Discriminates what a stored message row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Assistant,
    Tool,
    Status,
    BrowserState,
    TaskList,
    Summary,
}

/// A single stored event in a thread.
///
/// Rows are totally ordered by `(created_at, message_id)` within a
/// thread. Assistant-turn rows carry a `thread_run_id` in metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: Uuid,
    pub thread_id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub role: String,
    /// Structured content; plain text rides as a JSON string.
    pub content: serde_json::Value,
    /// Whether this row is part of the LLM-visible history.
    pub is_llm_message: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        thread_id: Uuid,
        project_id: Uuid,
        kind: MessageType,
        role: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            thread_id,
            project_id,
            kind,
            role: role.into(),
            content,
            is_llm_message: !matches!(kind, MessageType::Status | MessageType::BrowserState),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        if let serde_json::Value::Object(map) = &mut self.metadata {
            map.insert("thread_run_id".into(), serde_json::json!(run_id));
        }
        self
    }

    /// Text view of the content, for LLM history assembly.
    pub fn content_text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Sandbox metadata bound to a project on first sandbox-tool use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub id: String,
    pub pass: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnc_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: Uuid,
    pub account_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxInfo>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(account_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: Uuid::new_v4(),
            account_id: account_id.into(),
            name: name.into(),
            sandbox: None,
            created_at: Utc::now(),
        }
    }
}

/// One execution of the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub thread_id: Uuid,
    pub status: RunStatus,
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// First ~200 chars of the triggering user message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    /// First ~200 chars of the final assistant response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl RunRecord {
    pub fn new(thread_id: Uuid, instance_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            thread_id,
            status: RunStatus::Running,
            instance_id: instance_id.into(),
            model: None,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            input_preview: None,
            output_preview: None,
            usage: Usage::default(),
        }
    }
}

/// An immutable snapshot of an agent's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVersion {
    pub version_id: Uuid,
    pub agent_id: Uuid,
    pub system_prompt: String,
    /// Names of tools the agent may use.
    pub enabled_tools: BTreeSet<String>,
    /// Per-tool argument overrides.
    #[serde(default)]
    pub tool_args: HashMap<String, serde_json::Value>,
    pub model: String,
    pub version_tag: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: Uuid,
    pub account_id: String,
    pub name: String,
    pub current_version_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_llm_visibility_by_kind() {
        let t = Uuid::new_v4();
        let p = Uuid::new_v4();
        let user = MessageRecord::new(t, p, MessageType::User, "user", serde_json::json!("hi"));
        assert!(user.is_llm_message);
        let status =
            MessageRecord::new(t, p, MessageType::Status, "system", serde_json::json!({}));
        assert!(!status.is_llm_message);
    }

    #[test]
    fn with_run_id_sets_metadata() {
        let t = Uuid::new_v4();
        let run = Uuid::new_v4();
        let msg = MessageRecord::new(
            t,
            t,
            MessageType::Assistant,
            "assistant",
            serde_json::json!("reply"),
        )
        .with_run_id(run);
        assert_eq!(
            msg.metadata["thread_run_id"],
            serde_json::json!(run)
        );
    }

    #[test]
    fn message_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MessageType::TaskList).unwrap(),
            "\"task_list\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::BrowserState).unwrap(),
            "\"browser_state\""
        );
    }

    #[test]
    fn content_text_unwraps_strings() {
        let t = Uuid::new_v4();
        let msg =
            MessageRecord::new(t, t, MessageType::User, "user", serde_json::json!("plain"));
        assert_eq!(msg.content_text(), "plain");
        let msg = MessageRecord::new(
            t,
            t,
            MessageType::TaskList,
            "assistant",
            serde_json::json!({"sections": []}),
        );
        assert!(msg.content_text().contains("sections"));
    }
}
