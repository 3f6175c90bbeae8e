//! Terminal tools — invoking one ends the run.

use serde_json::Value;

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

fn terminal_caps() -> ToolCapabilities {
    ToolCapabilities {
        terminal: true,
        ..Default::default()
    }
}

/// Hand the turn back to the user with a question or request.
pub struct AskTool;

#[async_trait::async_trait]
impl Tool for AskTool {
    fn name(&self) -> &str {
        "ask"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their reply. Ends the current run."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The question for the user" }
            },
            "required": ["text"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="ask">
<parameter name="text">Which deployment target should I use?</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        terminal_caps()
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::terminal(args["text"].as_str().unwrap_or_default().to_string())
    }
}

/// Declare the task finished.
pub struct CompleteTool;

#[async_trait::async_trait]
impl Tool for CompleteTool {
    fn name(&self) -> &str {
        "complete"
    }

    fn description(&self) -> &str {
        "Signal that the task is fully complete. Ends the current run."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Optional completion summary" }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        terminal_caps()
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::terminal(
            args.get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("task complete")
                .to_string(),
        )
    }
}

/// Hand browser control to the user (captchas, logins).
pub struct WebBrowserTakeoverTool;

#[async_trait::async_trait]
impl Tool for WebBrowserTakeoverTool {
    fn name(&self) -> &str {
        "web_browser_takeover"
    }

    fn description(&self) -> &str {
        "Ask the user to take over the browser for a step the agent cannot do (login, captcha). Ends the current run."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "What the user should do in the browser" }
            },
            "required": ["text"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        terminal_caps()
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::terminal(args["text"].as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasklist::ThreadLockMap;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx() -> (tempfile::TempDir, ToolContext) {
        let state = tempfile::tempdir().unwrap();
        let messages = Arc::new(al_store::MessageLog::open(state.path()).unwrap());
        let ctx = ToolContext {
            run_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            sandbox: None,
            messages,
            tasklist_locks: Arc::new(ThreadLockMap::new()),
        };
        (state, ctx)
    }

    #[tokio::test]
    async fn terminal_tools_terminate() {
        let (_state, ctx) = ctx();
        let asked = AskTool
            .invoke(serde_json::json!({"text": "which one?"}), &ctx)
            .await;
        assert!(asked.is_terminal());
        assert_eq!(asked.output, "which one?");

        let completed = CompleteTool.invoke(serde_json::json!({}), &ctx).await;
        assert!(completed.is_terminal());

        let takeover = WebBrowserTakeoverTool
            .invoke(serde_json::json!({"text": "solve the captcha"}), &ctx)
            .await;
        assert!(takeover.is_terminal());
        assert!(AskTool.capabilities().terminal);
    }
}
