//! Project registry, including lazily-bound sandbox metadata.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use al_domain::error::{Error, Result};
use al_domain::record::{ProjectRecord, SandboxInfo};

use crate::{append_jsonl, read_jsonl};

pub struct ProjectStore {
    projects: RwLock<HashMap<Uuid, ProjectRecord>>,
    log_path: PathBuf,
}

impl ProjectStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let log_path = state_path.join("projects.jsonl");
        let mut projects = HashMap::new();
        for record in read_jsonl::<ProjectRecord>(&log_path) {
            projects.insert(record.project_id, record);
        }
        Ok(Self {
            projects: RwLock::new(projects),
            log_path,
        })
    }

    pub fn insert(&self, record: ProjectRecord) -> Result<Uuid> {
        let project_id = record.project_id;
        append_jsonl(&self.log_path, &record)?;
        self.projects.write().insert(project_id, record);
        Ok(project_id)
    }

    pub fn get(&self, project_id: &Uuid) -> Option<ProjectRecord> {
        self.projects.read().get(project_id).cloned()
    }

    /// Bind sandbox metadata to a project (first sandbox-tool use).
    /// Re-appends the updated record; last record wins on reload.
    pub fn set_sandbox(&self, project_id: &Uuid, sandbox: SandboxInfo) -> Result<()> {
        let updated = {
            let mut projects = self.projects.write();
            let record = projects
                .get_mut(project_id)
                .ok_or_else(|| Error::NotFound(format!("project {project_id}")))?;
            record.sandbox = Some(sandbox);
            record.clone()
        };
        append_jsonl(&self.log_path, &updated)
    }

    pub fn list_by_account(&self, account_id: &str) -> Vec<ProjectRecord> {
        let mut out: Vec<ProjectRecord> = self
            .projects
            .read()
            .values()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_binding_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).unwrap();

        let record = ProjectRecord::new("acct", "demo");
        let id = store.insert(record).unwrap();
        assert!(store.get(&id).unwrap().sandbox.is_none());

        store
            .set_sandbox(
                &id,
                SandboxInfo {
                    id: "sb-1".into(),
                    pass: "secret".into(),
                    vnc_preview: None,
                    sandbox_url: None,
                },
            )
            .unwrap();

        let store2 = ProjectStore::open(dir.path()).unwrap();
        assert_eq!(store2.get(&id).unwrap().sandbox.unwrap().id, "sb-1");
    }

    #[test]
    fn set_sandbox_on_missing_project_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).unwrap();
        let err = store.set_sandbox(
            &Uuid::new_v4(),
            SandboxInfo {
                id: "sb".into(),
                pass: "p".into(),
                vnc_preview: None,
                sandbox_url: None,
            },
        );
        assert!(err.is_err());
    }
}
