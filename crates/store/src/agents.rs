//! Agent registry with immutable version snapshots.
//!
//! Versions are append-only; an agent points at its current version and
//! keeps its full history. Changing an agent means appending a new
//! version and re-appending the agent row with the new pointer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use al_domain::error::{Error, Result};
use al_domain::record::{AgentRecord, AgentVersion};

use crate::{append_jsonl, read_jsonl};

pub struct AgentStore {
    agents: RwLock<HashMap<Uuid, AgentRecord>>,
    versions: RwLock<HashMap<Uuid, AgentVersion>>,
    agents_path: PathBuf,
    versions_path: PathBuf,
}

impl AgentStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let agents_path = state_path.join("agents.jsonl");
        let versions_path = state_path.join("agent_versions.jsonl");

        let mut agents = HashMap::new();
        for record in read_jsonl::<AgentRecord>(&agents_path) {
            agents.insert(record.agent_id, record);
        }
        let mut versions = HashMap::new();
        for version in read_jsonl::<AgentVersion>(&versions_path) {
            versions.insert(version.version_id, version);
        }

        Ok(Self {
            agents: RwLock::new(agents),
            versions: RwLock::new(versions),
            agents_path,
            versions_path,
        })
    }

    /// Create an agent together with its first version.
    pub fn create(
        &self,
        account_id: impl Into<String>,
        name: impl Into<String>,
        mut version: AgentVersion,
    ) -> Result<AgentRecord> {
        let agent_id = Uuid::new_v4();
        version.agent_id = agent_id;
        let record = AgentRecord {
            agent_id,
            account_id: account_id.into(),
            name: name.into(),
            current_version_id: version.version_id,
            created_at: Utc::now(),
        };
        append_jsonl(&self.versions_path, &version)?;
        append_jsonl(&self.agents_path, &record)?;
        self.versions.write().insert(version.version_id, version);
        self.agents.write().insert(agent_id, record.clone());
        Ok(record)
    }

    /// Append a new immutable version and move the agent's pointer.
    pub fn add_version(&self, agent_id: &Uuid, mut version: AgentVersion) -> Result<Uuid> {
        version.agent_id = *agent_id;
        let updated = {
            let mut agents = self.agents.write();
            let record = agents
                .get_mut(agent_id)
                .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
            record.current_version_id = version.version_id;
            record.clone()
        };
        let version_id = version.version_id;
        append_jsonl(&self.versions_path, &version)?;
        append_jsonl(&self.agents_path, &updated)?;
        self.versions.write().insert(version_id, version);
        Ok(version_id)
    }

    pub fn get(&self, agent_id: &Uuid) -> Option<AgentRecord> {
        self.agents.read().get(agent_id).cloned()
    }

    pub fn get_version(&self, version_id: &Uuid) -> Option<AgentVersion> {
        self.versions.read().get(version_id).cloned()
    }

    /// The agent's current version snapshot.
    pub fn current_version(&self, agent_id: &Uuid) -> Option<AgentVersion> {
        let record = self.get(agent_id)?;
        self.get_version(&record.current_version_id)
    }

    /// All versions of an agent, oldest first.
    pub fn versions_of(&self, agent_id: &Uuid) -> Vec<AgentVersion> {
        let mut out: Vec<AgentVersion> = self
            .versions
            .read()
            .values()
            .filter(|v| &v.agent_id == agent_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    pub fn list_by_account(&self, account_id: &str) -> Vec<AgentRecord> {
        let mut out: Vec<AgentRecord> = self
            .agents
            .read()
            .values()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn version(tag: &str) -> AgentVersion {
        AgentVersion {
            version_id: Uuid::new_v4(),
            agent_id: Uuid::nil(),
            system_prompt: "You are a helper.".into(),
            enabled_tools: BTreeSet::from(["execute_command".to_string()]),
            tool_args: Default::default(),
            model: "openai/gpt-4o".into(),
            version_tag: tag.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::open(dir.path()).unwrap();

        let agent = store.create("acct", "helper", version("v1")).unwrap();
        let current = store.current_version(&agent.agent_id).unwrap();
        assert_eq!(current.version_tag, "v1");
        assert_eq!(current.agent_id, agent.agent_id);
    }

    #[test]
    fn add_version_moves_pointer_and_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::open(dir.path()).unwrap();

        let agent = store.create("acct", "helper", version("v1")).unwrap();
        let mut v2 = version("v2");
        v2.created_at = Utc::now() + chrono::Duration::seconds(1);
        store.add_version(&agent.agent_id, v2).unwrap();

        let current = store.current_version(&agent.agent_id).unwrap();
        assert_eq!(current.version_tag, "v2");

        let history = store.versions_of(&agent.agent_id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version_tag, "v1");
    }

    #[test]
    fn reload_preserves_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::open(dir.path()).unwrap();

        let agent = store.create("acct", "helper", version("v1")).unwrap();
        let mut v2 = version("v2");
        v2.created_at = Utc::now() + chrono::Duration::seconds(1);
        store.add_version(&agent.agent_id, v2).unwrap();

        let store2 = AgentStore::open(dir.path()).unwrap();
        assert_eq!(
            store2.current_version(&agent.agent_id).unwrap().version_tag,
            "v2"
        );
    }

    #[test]
    fn add_version_to_missing_agent_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::open(dir.path()).unwrap();
        assert!(store.add_version(&Uuid::new_v4(), version("v1")).is_err());
    }
}
