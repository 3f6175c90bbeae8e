//! Sectioned task-list snapshot: the agent's plan-of-record.
//!
//! A thread's current list is the content of its newest `task_list`
//! message. Every mutation writes a whole new snapshot, so readers
//! always see a self-consistent state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!(
                "invalid status '{other}' (expected pending, completed, or cancelled)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    pub section_id: String,
}

impl Task {
    pub fn new(content: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            status: TaskStatus::Pending,
            section_id: section_id.into(),
        }
    }
}

/// The stored shape of a `task_list` message's content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListSnapshot {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskListSnapshot {
    /// Every task's `section_id` must reference a section in the same
    /// snapshot.
    pub fn is_consistent(&self) -> bool {
        self.tasks
            .iter()
            .all(|t| self.sections.iter().any(|s| s.id == t.section_id))
    }

    /// Rendered response: tasks grouped by section, only sections that
    /// contain at least one task, totals over the whole snapshot.
    pub fn render(&self) -> serde_json::Value {
        let mut formatted = Vec::new();
        for section in &self.sections {
            let section_tasks: Vec<_> = self
                .tasks
                .iter()
                .filter(|t| t.section_id == section.id)
                .map(|t| serde_json::to_value(t).unwrap_or_default())
                .collect();
            if !section_tasks.is_empty() {
                formatted.push(serde_json::json!({
                    "id": section.id,
                    "title": section.title,
                    "tasks": section_tasks,
                }));
            }
        }
        serde_json::json!({
            "sections": formatted,
            "total_tasks": self.tasks.len(),
            "total_sections": self.sections.len(),
        })
    }

    /// Find a section by title, case-insensitively.
    pub fn section_by_title(&self, title: &str) -> Option<&Section> {
        let lower = title.to_lowercase();
        self.sections.iter().find(|s| s.title.to_lowercase() == lower)
    }
}
