//! Persistent store — threads, messages, projects, runs, agents.
//!
//! Every table is an append-only JSONL file with an in-memory index,
//! loaded at startup. Registries (threads, projects, agents) use
//! last-record-wins on reload so updates are plain appends; message
//! logs are one file per thread and strictly append-only.

pub mod agents;
pub mod messages;
pub mod projects;
pub mod runs;
pub mod threads;

use std::path::Path;
use std::sync::Arc;

pub use agents::AgentStore;
pub use messages::MessageLog;
pub use projects::ProjectStore;
pub use runs::RunStore;
pub use threads::ThreadStore;

/// All persistence services, constructed once at startup and shared.
#[derive(Clone)]
pub struct Store {
    pub threads: Arc<ThreadStore>,
    pub projects: Arc<ProjectStore>,
    pub messages: Arc<MessageLog>,
    pub runs: Arc<RunStore>,
    pub agents: Arc<AgentStore>,
}

impl Store {
    pub fn open(state_path: &Path) -> al_domain::error::Result<Self> {
        std::fs::create_dir_all(state_path)?;
        Ok(Self {
            threads: Arc::new(ThreadStore::open(state_path)?),
            projects: Arc::new(ProjectStore::open(state_path)?),
            messages: Arc::new(MessageLog::open(state_path)?),
            runs: Arc::new(RunStore::open(state_path)?),
            agents: Arc::new(AgentStore::open(state_path)?),
        })
    }
}

/// Append one JSON line to a file, creating it if needed.
pub(crate) fn append_jsonl<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> al_domain::error::Result<()> {
    use std::io::Write;
    let json = serde_json::to_string(value)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{json}")?;
    Ok(())
}

/// Read a JSONL file tolerantly, skipping malformed lines.
pub(crate) fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(v) => out.push(v),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed JSONL line");
            }
        }
    }
    out
}
