//! Workspace file operations.

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

fn sandbox_caps() -> ToolCapabilities {
    ToolCapabilities {
        requires_sandbox: true,
        parallel_safe: true,
        ..Default::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CreateFileTool;

#[async_trait::async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file in the workspace with the given contents."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path relative to /workspace" },
                "file_contents": { "type": "string", "description": "Full contents of the file" }
            },
            "required": ["file_path", "file_contents"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="create_file">
<parameter name="file_path">src/index.html</parameter>
<parameter name="file_contents"><!DOCTYPE html>...</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        sandbox_caps()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let path = args["file_path"].as_str().unwrap_or_default();
        let contents = args["file_contents"].as_str().unwrap_or_default();
        match sandbox.write_file(path, contents).await {
            Ok(()) => ToolResult::ok(format!("created {path} ({} bytes)", contents.len()))
                .with_attachment("file", path),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// read_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ReadFileTool;

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the workspace."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path relative to /workspace" }
            },
            "required": ["file_path"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        sandbox_caps()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let path = args["file_path"].as_str().unwrap_or_default();
        match sandbox.read_file(path).await {
            Ok(contents) => ToolResult::ok(contents),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// delete_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DeleteFileTool;

#[async_trait::async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file from the workspace."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path relative to /workspace" }
            },
            "required": ["file_path"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        sandbox_caps()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let path = args["file_path"].as_str().unwrap_or_default();
        match sandbox.delete_file(path).await {
            Ok(()) => ToolResult::ok(format!("deleted {path}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// list_dir
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ListDirTool;

#[async_trait::async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory relative to /workspace (default: the root)" }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        sandbox_caps()
    }

    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        match sandbox.list_dir(path).await {
            Ok(entries) => ToolResult::ok(entries.join("\n")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasklist::ThreadLockMap;
    use crate::LocalSandbox;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx(dir: &std::path::Path) -> (tempfile::TempDir, ToolContext) {
        let state = tempfile::tempdir().unwrap();
        let messages = Arc::new(al_store::MessageLog::open(state.path()).unwrap());
        let ctx = ToolContext {
            run_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            sandbox: Some(Arc::new(
                LocalSandbox::new(dir.to_path_buf(), 10_000).unwrap(),
            )),
            messages,
            tasklist_locks: Arc::new(ThreadLockMap::new()),
        };
        (state, ctx)
    }

    #[tokio::test]
    async fn create_read_list_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());

        let created = CreateFileTool
            .invoke(
                serde_json::json!({"file_path": "notes/hello.txt", "file_contents": "hi"}),
                &ctx,
            )
            .await;
        assert!(created.success);
        assert_eq!(created.attachments[0].reference, "notes/hello.txt");

        let read = ReadFileTool
            .invoke(serde_json::json!({"file_path": "notes/hello.txt"}), &ctx)
            .await;
        assert!(read.success);
        assert_eq!(read.output, "hi");

        let listed = ListDirTool
            .invoke(serde_json::json!({"path": "notes"}), &ctx)
            .await;
        assert!(listed.success);
        assert_eq!(listed.output, "hello.txt");

        let deleted = DeleteFileTool
            .invoke(serde_json::json!({"file_path": "notes/hello.txt"}), &ctx)
            .await;
        assert!(deleted.success);

        let read_again = ReadFileTool
            .invoke(serde_json::json!({"file_path": "notes/hello.txt"}), &ctx)
            .await;
        assert!(!read_again.success);
    }

    #[tokio::test]
    async fn escape_attempts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());
        let result = ReadFileTool
            .invoke(serde_json::json!({"file_path": "../outside.txt"}), &ctx)
            .await;
        assert!(!result.success);
        assert!(result.output.contains("escapes the workspace"));
    }
}
