//! Task-list tools — the agent's sectioned plan-of-record.
//!
//! The list is materialized as the newest `task_list` message in the
//! thread. Every mutation loads that snapshot, modifies it, and appends
//! a whole new snapshot message, serialized per thread by
//! [`ThreadLockMap`] so concurrent mutations cannot interleave.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use al_domain::record::{MessageRecord, MessageType};
use al_domain::tasklist::{Section, Task, TaskListSnapshot, TaskStatus};

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-thread serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One logical mutex per thread, guarding the load-modify-save cycle.
/// Held only around the storage operation.
pub struct ThreadLockMap {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for ThreadLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, thread_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn load(ctx: &ToolContext) -> TaskListSnapshot {
    ctx.messages
        .latest_of_kind(&ctx.thread_id, MessageType::TaskList)
        .and_then(|m| serde_json::from_value(m.content).ok())
        .unwrap_or_default()
}

fn save(ctx: &ToolContext, snapshot: &TaskListSnapshot) -> Result<(), String> {
    let content = serde_json::to_value(snapshot).map_err(|e| e.to_string())?;
    let mut record = MessageRecord::new(
        ctx.thread_id,
        ctx.project_id,
        MessageType::TaskList,
        "assistant",
        content,
    );
    record.is_llm_message = false;
    ctx.messages.append(&record).map_err(|e| e.to_string())
}

fn rendered(snapshot: &TaskListSnapshot) -> ToolResult {
    match serde_json::to_string_pretty(&snapshot.render()) {
        Ok(json) => ToolResult::ok(json),
        Err(e) => ToolResult::error(e.to_string()),
    }
}

/// Accept a bare id string, a JSON array of ids, or a JSON-encoded
/// array carried as a string (XML parameter form).
fn normalize_ids(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                let parsed: Vec<String> =
                    serde_json::from_str(trimmed).map_err(|e| format!("invalid id list: {e}"))?;
                Ok(parsed)
            } else {
                Ok(vec![s.clone()])
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| format!("id entries must be strings, got {v}"))
            })
            .collect(),
        other => Err(format!("expected an id or list of ids, got {other}")),
    }
}

fn tasklist_caps() -> ToolCapabilities {
    // Serialized by the thread lock, so never parallel-safe.
    ToolCapabilities::default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CreateTasksTool;

#[async_trait::async_trait]
impl Tool for CreateTasksTool {
    fn name(&self) -> &str {
        "create_tasks"
    }

    fn description(&self) -> &str {
        "Create tasks organized into sections. Sections are created on demand by case-insensitive title; tasks are appended in the given order."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sections": {
                    "type": "array",
                    "description": "Batch creation: [{\"title\": \"Setup\", \"tasks\": [\"a\", \"b\"]}, ...]"
                },
                "section_title": {
                    "type": "string",
                    "description": "Single-section form: section title (created if missing)"
                },
                "section_id": {
                    "type": "string",
                    "description": "Single-section form: existing section id"
                },
                "task_contents": {
                    "type": "array",
                    "description": "Single-section form: task contents, in execution order"
                }
            }
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="create_tasks">
<parameter name="sections">[{"title": "Planning", "tasks": ["Research requirements", "Write plan"]}]</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        tasklist_caps()
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let _guard = ctx.tasklist_locks.acquire(ctx.thread_id).await;
        let mut snapshot = load(ctx);

        if let Some(sections) = args.get("sections").and_then(|v| v.as_array()) {
            for section_data in sections {
                let Some(title) = section_data.get("title").and_then(|v| v.as_str()) else {
                    return ToolResult::error("each section needs a 'title'");
                };
                let Some(tasks) = section_data.get("tasks").and_then(|v| v.as_array()) else {
                    return ToolResult::error("each section needs a 'tasks' array");
                };
                let section_id = match snapshot.section_by_title(title) {
                    Some(existing) => existing.id.clone(),
                    None => {
                        let section = Section::new(title);
                        let id = section.id.clone();
                        snapshot.sections.push(section);
                        id
                    }
                };
                for task in tasks {
                    let Some(content) = task.as_str() else {
                        return ToolResult::error("task entries must be strings");
                    };
                    snapshot.tasks.push(Task::new(content, &section_id));
                }
            }
        } else {
            let Some(contents) = args.get("task_contents").and_then(|v| v.as_array()) else {
                return ToolResult::error(
                    "provide a 'sections' array, or 'task_contents' with section info",
                );
            };

            let section_id = if let Some(id) = args.get("section_id").and_then(|v| v.as_str()) {
                match snapshot.sections.iter().find(|s| s.id == id) {
                    Some(section) => section.id.clone(),
                    None => return ToolResult::error(format!("section id '{id}' not found")),
                }
            } else {
                let title = args
                    .get("section_title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Tasks");
                match snapshot.section_by_title(title) {
                    Some(existing) => existing.id.clone(),
                    None => {
                        let section = Section::new(title);
                        let id = section.id.clone();
                        snapshot.sections.push(section);
                        id
                    }
                }
            };

            for task in contents {
                let Some(content) = task.as_str() else {
                    return ToolResult::error("task entries must be strings");
                };
                snapshot.tasks.push(Task::new(content, &section_id));
            }
        }

        if let Err(e) = save(ctx, &snapshot) {
            return ToolResult::error(format!("failed to save task list: {e}"));
        }
        rendered(&snapshot)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// view_tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ViewTasksTool;

#[async_trait::async_trait]
impl Tool for ViewTasksTool {
    fn name(&self) -> &str {
        "view_tasks"
    }

    fn description(&self) -> &str {
        "View the current task list grouped by section. Check this before starting the next step."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="view_tasks">
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        tasklist_caps()
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        rendered(&load(ctx))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// update_tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct UpdateTasksTool;

#[async_trait::async_trait]
impl Tool for UpdateTasksTool {
    fn name(&self) -> &str {
        "update_tasks"
    }

    fn description(&self) -> &str {
        "Update one or more tasks (content, status, or section). Batch completed tasks into a single call. All ids must exist; a bad id rejects the whole batch."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_ids": {
                    "description": "A task id, or an array of task ids"
                },
                "content": { "type": "string", "description": "New task content" },
                "status": {
                    "type": "string",
                    "description": "New status: pending, completed, or cancelled"
                },
                "section_id": { "type": "string", "description": "Move task(s) to this section" }
            },
            "required": ["task_ids"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="update_tasks">
<parameter name="task_ids">["task-id-1", "task-id-2"]</parameter>
<parameter name="status">completed</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        tasklist_caps()
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let ids = match normalize_ids(&args["task_ids"]) {
            Ok(ids) => ids,
            Err(e) => return ToolResult::error(e),
        };
        let content = args.get("content").and_then(|v| v.as_str());
        let section_id = args.get("section_id").and_then(|v| v.as_str());
        let status = match args.get("status").and_then(|v| v.as_str()) {
            Some(raw) => match raw.parse::<TaskStatus>() {
                Ok(status) => Some(status),
                Err(e) => return ToolResult::error(e),
            },
            None => None,
        };

        let _guard = ctx.tasklist_locks.acquire(ctx.thread_id).await;
        let mut snapshot = load(ctx);

        // Validate the whole batch before touching anything.
        let missing: Vec<&String> = ids
            .iter()
            .filter(|id| !snapshot.tasks.iter().any(|t| &t.id == *id))
            .collect();
        if !missing.is_empty() {
            return ToolResult::error(format!("task ids not found: {missing:?}"));
        }
        if let Some(sid) = section_id {
            if !snapshot.sections.iter().any(|s| s.id == sid) {
                return ToolResult::error(format!("section id '{sid}' not found"));
            }
        }

        for task in snapshot.tasks.iter_mut() {
            if !ids.contains(&task.id) {
                continue;
            }
            if let Some(content) = content {
                task.content = content.to_string();
            }
            if let Some(status) = status {
                task.status = status;
            }
            if let Some(sid) = section_id {
                task.section_id = sid.to_string();
            }
        }

        if let Err(e) = save(ctx, &snapshot) {
            return ToolResult::error(format!("failed to save task list: {e}"));
        }
        rendered(&snapshot)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// delete_tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DeleteTasksTool;

#[async_trait::async_trait]
impl Tool for DeleteTasksTool {
    fn name(&self) -> &str {
        "delete_tasks"
    }

    fn description(&self) -> &str {
        "Delete tasks and/or whole sections. Deleting a section removes its tasks and requires confirm=true."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_ids": { "description": "A task id, or an array of task ids" },
                "section_ids": { "description": "A section id, or an array of section ids" },
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true when deleting sections"
                }
            }
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="delete_tasks">
<parameter name="section_ids">["section-id-1"]</parameter>
<parameter name="confirm">true</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        tasklist_caps()
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let task_ids = match args.get("task_ids") {
            Some(v) if !v.is_null() => match normalize_ids(v) {
                Ok(ids) => Some(ids),
                Err(e) => return ToolResult::error(e),
            },
            _ => None,
        };
        let section_ids = match args.get("section_ids") {
            Some(v) if !v.is_null() => match normalize_ids(v) {
                Ok(ids) => Some(ids),
                Err(e) => return ToolResult::error(e),
            },
            _ => None,
        };
        let confirm = args.get("confirm").and_then(|v| v.as_bool()).unwrap_or(false);

        if task_ids.is_none() && section_ids.is_none() {
            return ToolResult::error("provide task_ids and/or section_ids");
        }
        if section_ids.is_some() && !confirm {
            return ToolResult::error("set confirm=true to delete sections");
        }

        let _guard = ctx.tasklist_locks.acquire(ctx.thread_id).await;
        let mut snapshot = load(ctx);

        if let Some(ids) = &task_ids {
            let missing: Vec<&String> = ids
                .iter()
                .filter(|id| !snapshot.tasks.iter().any(|t| &t.id == *id))
                .collect();
            if !missing.is_empty() {
                return ToolResult::error(format!("task ids not found: {missing:?}"));
            }
            snapshot.tasks.retain(|t| !ids.contains(&t.id));
        }

        if let Some(ids) = &section_ids {
            let missing: Vec<&String> = ids
                .iter()
                .filter(|id| !snapshot.sections.iter().any(|s| &s.id == *id))
                .collect();
            if !missing.is_empty() {
                return ToolResult::error(format!("section ids not found: {missing:?}"));
            }
            snapshot.sections.retain(|s| !ids.contains(&s.id));
            snapshot.tasks.retain(|t| !ids.contains(&t.section_id));
        }

        if let Err(e) = save(ctx, &snapshot) {
            return ToolResult::error(format!("failed to save task list: {e}"));
        }
        rendered(&snapshot)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// clear_all
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ClearAllTool;

#[async_trait::async_trait]
impl Tool for ClearAllTool {
    fn name(&self) -> &str {
        "clear_all"
    }

    fn description(&self) -> &str {
        "Remove every task and section, leaving a clean slate. Requires confirm=true."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "confirm": { "type": "boolean", "description": "Must be true" }
            },
            "required": ["confirm"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        tasklist_caps()
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        if !args.get("confirm").and_then(|v| v.as_bool()).unwrap_or(false) {
            return ToolResult::error("set confirm=true to clear all tasks");
        }
        let _guard = ctx.tasklist_locks.acquire(ctx.thread_id).await;
        let snapshot = TaskListSnapshot::default();
        if let Err(e) = save(ctx, &snapshot) {
            return ToolResult::error(format!("failed to save task list: {e}"));
        }
        rendered(&snapshot)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

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

    async fn create_plan(ctx: &ToolContext) -> Value {
        let result = CreateTasksTool
            .invoke(
                serde_json::json!({
                    "sections": [{"title": "Plan", "tasks": ["a", "b", "c"]}]
                }),
                ctx,
            )
            .await;
        assert!(result.success, "{}", result.output);
        serde_json::from_str(&result.output).unwrap()
    }

    fn task_ids(rendered: &Value) -> Vec<String> {
        rendered["sections"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn create_then_view_preserves_input_order() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        assert_eq!(created["total_tasks"], 3);

        let viewed = ViewTasksTool.invoke(serde_json::json!({}), &ctx).await;
        let rendered: Value = serde_json::from_str(&viewed.output).unwrap();
        let contents: Vec<&str> = rendered["sections"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn create_reuses_sections_case_insensitively() {
        let (_state, ctx) = ctx();
        create_plan(&ctx).await;
        let result = CreateTasksTool
            .invoke(
                serde_json::json!({
                    "sections": [{"title": "plan", "tasks": ["d"]}]
                }),
                &ctx,
            )
            .await;
        let rendered: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(rendered["total_sections"], 1);
        assert_eq!(rendered["total_tasks"], 4);
    }

    #[tokio::test]
    async fn single_section_form_defaults_title() {
        let (_state, ctx) = ctx();
        let result = CreateTasksTool
            .invoke(serde_json::json!({"task_contents": ["only"]}), &ctx)
            .await;
        let rendered: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(rendered["sections"][0]["title"], "Tasks");
    }

    #[tokio::test]
    async fn batch_update_marks_status_and_preserves_ids() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let ids = task_ids(&created);

        let result = UpdateTasksTool
            .invoke(
                serde_json::json!({
                    "task_ids": [ids[0], ids[1]],
                    "status": "completed"
                }),
                &ctx,
            )
            .await;
        assert!(result.success);
        let rendered: Value = serde_json::from_str(&result.output).unwrap();
        let tasks = rendered["sections"][0]["tasks"].as_array().unwrap();
        assert_eq!(tasks[0]["status"], "completed");
        assert_eq!(tasks[1]["status"], "completed");
        assert_eq!(tasks[2]["status"], "pending");
        // Ids are stable across updates.
        assert_eq!(task_ids(&rendered), ids);
    }

    #[tokio::test]
    async fn update_rejects_batch_on_any_missing_id() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let ids = task_ids(&created);

        let result = UpdateTasksTool
            .invoke(
                serde_json::json!({
                    "task_ids": [ids[0], "missing-id"],
                    "status": "completed"
                }),
                &ctx,
            )
            .await;
        assert!(!result.success);

        // Nothing changed.
        let viewed = ViewTasksTool.invoke(serde_json::json!({}), &ctx).await;
        let rendered: Value = serde_json::from_str(&viewed.output).unwrap();
        assert_eq!(rendered["sections"][0]["tasks"][0]["status"], "pending");
    }

    #[tokio::test]
    async fn update_rejects_invalid_status() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let ids = task_ids(&created);
        let result = UpdateTasksTool
            .invoke(
                serde_json::json!({"task_ids": ids[0], "status": "done"}),
                &ctx,
            )
            .await;
        assert!(!result.success);
        assert!(result.output.contains("invalid status"));
    }

    #[tokio::test]
    async fn update_accepts_single_string_id() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let ids = task_ids(&created);
        let result = UpdateTasksTool
            .invoke(
                serde_json::json!({"task_ids": ids[0], "content": "renamed"}),
                &ctx,
            )
            .await;
        let rendered: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(rendered["sections"][0]["tasks"][0]["content"], "renamed");
    }

    #[tokio::test]
    async fn delete_section_requires_confirm_and_cascades() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let section_id = created["sections"][0]["id"].as_str().unwrap().to_string();

        let unconfirmed = DeleteTasksTool
            .invoke(serde_json::json!({"section_ids": section_id}), &ctx)
            .await;
        assert!(!unconfirmed.success);

        let confirmed = DeleteTasksTool
            .invoke(
                serde_json::json!({"section_ids": section_id, "confirm": true}),
                &ctx,
            )
            .await;
        assert!(confirmed.success);
        let rendered: Value = serde_json::from_str(&confirmed.output).unwrap();
        assert_eq!(rendered["total_tasks"], 0);
        assert_eq!(rendered["total_sections"], 0);
    }

    #[tokio::test]
    async fn delete_requires_some_target() {
        let (_state, ctx) = ctx();
        let result = DeleteTasksTool.invoke(serde_json::json!({}), &ctx).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn clear_all_needs_confirm() {
        let (_state, ctx) = ctx();
        create_plan(&ctx).await;

        let refused = ClearAllTool.invoke(serde_json::json!({}), &ctx).await;
        assert!(!refused.success);

        let cleared = ClearAllTool
            .invoke(serde_json::json!({"confirm": true}), &ctx)
            .await;
        assert!(cleared.success);
        let rendered: Value = serde_json::from_str(&cleared.output).unwrap();
        assert_eq!(rendered["total_tasks"], 0);
    }

    #[tokio::test]
    async fn xml_style_string_ids_are_accepted() {
        let (_state, ctx) = ctx();
        let created = create_plan(&ctx).await;
        let ids = task_ids(&created);
        // The XML parser delivers parameters as strings.
        let result = UpdateTasksTool
            .invoke(
                serde_json::json!({
                    "task_ids": format!("[\"{}\", \"{}\"]", ids[0], ids[1]),
                    "status": "completed"
                }),
                &ctx,
            )
            .await;
        assert!(result.success, "{}", result.output);
        let rendered: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(rendered["sections"][0]["tasks"][1]["status"], "completed");
    }

    #[tokio::test]
    async fn every_mutation_appends_a_new_snapshot_message() {
        let (_state, ctx) = ctx();
        create_plan(&ctx).await;
        ClearAllTool
            .invoke(serde_json::json!({"confirm": true}), &ctx)
            .await;
        let snapshots: Vec<_> = ctx
            .messages
            .read(&ctx.thread_id)
            .into_iter()
            .filter(|m| m.kind == MessageType::TaskList)
            .collect();
        assert_eq!(snapshots.len(), 2);
    }
}
