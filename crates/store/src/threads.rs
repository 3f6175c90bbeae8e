//! Thread registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use al_domain::error::Result;
use al_domain::record::ThreadRecord;

use crate::{append_jsonl, read_jsonl};

pub struct ThreadStore {
    threads: RwLock<HashMap<Uuid, ThreadRecord>>,
    log_path: PathBuf,
}

impl ThreadStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let log_path = state_path.join("threads.jsonl");
        let mut threads = HashMap::new();
        // Last record wins: updates are re-appends.
        for record in read_jsonl::<ThreadRecord>(&log_path) {
            threads.insert(record.thread_id, record);
        }
        Ok(Self {
            threads: RwLock::new(threads),
            log_path,
        })
    }

    pub fn insert(&self, record: ThreadRecord) -> Result<Uuid> {
        let thread_id = record.thread_id;
        append_jsonl(&self.log_path, &record)?;
        self.threads.write().insert(thread_id, record);
        Ok(thread_id)
    }

    pub fn get(&self, thread_id: &Uuid) -> Option<ThreadRecord> {
        self.threads.read().get(thread_id).cloned()
    }

    /// Threads owned by an account, newest first (sidebar query).
    pub fn list_by_account(&self, account_id: &str) -> Vec<ThreadRecord> {
        let mut out: Vec<ThreadRecord> = self
            .threads
            .read()
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(dir.path()).unwrap();

        let record = ThreadRecord::new(Uuid::new_v4(), "acct-1");
        let id = store.insert(record).unwrap();
        assert_eq!(store.get(&id).unwrap().account_id, "acct-1");

        // Reopen from disk.
        let store2 = ThreadStore::open(dir.path()).unwrap();
        assert_eq!(store2.get(&id).unwrap().account_id, "acct-1");
    }

    #[test]
    fn list_by_account_filters_and_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(dir.path()).unwrap();

        let project = Uuid::new_v4();
        let t1 = ThreadRecord::new(project, "alpha");
        let mut t2 = ThreadRecord::new(project, "alpha");
        t2.created_at = t1.created_at + chrono::Duration::seconds(5);
        store.insert(t1.clone()).unwrap();
        store.insert(t2.clone()).unwrap();
        store.insert(ThreadRecord::new(project, "beta")).unwrap();

        let listed = store.list_by_account("alpha");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].thread_id, t2.thread_id);
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(dir.path()).unwrap();
        assert!(store.get(&Uuid::new_v4()).is_none());
    }
}
