//! The tool contract.

use std::sync::Arc;

use uuid::Uuid;

use al_domain::chat::ToolDefinition;
use al_domain::event::Attachment;
use al_store::MessageLog;

use crate::sandbox::SandboxHandle;
use crate::tasklist::ThreadLockMap;

/// Declarative flags describing how a tool behaves; the dispatcher
/// derives timeouts and scheduling from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCapabilities {
    /// Needs a sandbox handle in the context.
    pub requires_sandbox: bool,
    /// Gets the long timeout instead of the default.
    pub long_running: bool,
    /// Gets the build timeout (longest class).
    pub build: bool,
    /// Emits incremental output while running.
    pub streaming_output: bool,
    /// Invoking this tool ends the run.
    pub terminal: bool,
    /// May run concurrently with other parallel-safe calls in a turn.
    pub parallel_safe: bool,
}

/// Per-invocation context handed to a tool. Tools must not hold onto
/// it beyond the call.
#[derive(Clone)]
pub struct ToolContext {
    pub run_id: Uuid,
    pub thread_id: Uuid,
    pub project_id: Uuid,
    /// Present when the project has a sandbox bound.
    pub sandbox: Option<Arc<dyn SandboxHandle>>,
    pub messages: Arc<MessageLog>,
    pub tasklist_locks: Arc<ThreadLockMap>,
}

impl ToolContext {
    /// The sandbox handle, or a uniform failure for sandbox tools
    /// invoked without one.
    pub fn require_sandbox(&self) -> Result<Arc<dyn SandboxHandle>, ToolResult> {
        self.sandbox
            .clone()
            .ok_or_else(|| ToolResult::error("no sandbox is available for this project"))
    }
}

/// What a tool invocation produced.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub attachments: Vec<Attachment>,
    pub follow_up: Option<FollowUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// The run ends after this result is fed back.
    Terminate,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            attachments: Vec::new(),
            follow_up: None,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            attachments: Vec::new(),
            follow_up: None,
        }
    }

    pub fn terminal(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            attachments: Vec::new(),
            follow_up: Some(FollowUp::Terminate),
        }
    }

    pub fn with_attachment(mut self, kind: impl Into<String>, reference: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            kind: kind.into(),
            reference: reference.into(),
        });
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.follow_up, Some(FollowUp::Terminate))
    }
}

/// A tool the model can invoke.
///
/// Implementations map their own failures into
/// `ToolResult { success: false }` — a tool invocation never takes the
/// worker down.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters
    /// (`{type:"object", properties, required}`).
    fn parameters(&self) -> serde_json::Value;
    /// XML usage examples injected into the system prompt in XML mode.
    fn examples(&self) -> &str {
        ""
    }
    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::default()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult;

    /// The definition handed to the LLM.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// OpenAPI-style function schema wrapper.
    fn function_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_constructors() {
        let ok = ToolResult::ok("fine");
        assert!(ok.success);
        assert!(!ok.is_terminal());

        let err = ToolResult::error("nope");
        assert!(!err.success);

        let terminal = ToolResult::terminal("done");
        assert!(terminal.success);
        assert!(terminal.is_terminal());
    }

    #[test]
    fn attachments_accumulate() {
        let result = ToolResult::ok("made a file")
            .with_attachment("file", "/workspace/a.txt")
            .with_attachment("file", "/workspace/b.txt");
        assert_eq!(result.attachments.len(), 2);
        assert_eq!(result.attachments[0].reference, "/workspace/a.txt");
    }
}
