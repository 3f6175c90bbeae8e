//! Shell execution in the project sandbox.

use std::time::Duration;

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

pub struct ExecuteCommandTool;

#[async_trait::async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the project workspace. Returns combined stdout/stderr and the exit code."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to execute" },
                "timeout_sec": { "type": "integer", "description": "Override the command timeout in seconds" }
            },
            "required": ["command"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="execute_command">
<parameter name="command">ls -la /workspace</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            requires_sandbox: true,
            long_running: true,
            ..Default::default()
        }
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let command = args["command"].as_str().unwrap_or_default();
        let timeout = args
            .get("timeout_sec")
            .and_then(|v| v.as_u64())
            .unwrap_or(300);

        match sandbox.exec(command, Duration::from_secs(timeout)).await {
            Ok(outcome) if outcome.exit_code == 0 => ToolResult::ok(outcome.output),
            Ok(outcome) => ToolResult::error(format!(
                "exit code {}\n{}",
                outcome.exit_code, outcome.output
            )),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
