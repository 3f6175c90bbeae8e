//! Run tracking — persistent execution records for every agent run.
//!
//! Runs are kept in a bounded in-memory ring with an O(1) id index and
//! persisted to a JSONL file. The terminal-status transition is
//! exactly-once: a second terminal write is a no-op.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use al_domain::error::Result;
use al_domain::event::RunStatus;
use al_domain::record::RunRecord;

use crate::{append_jsonl, read_jsonl};

const MAX_RUNS_IN_MEMORY: usize = 2000;

pub struct RunStore {
    inner: RwLock<RunStoreInner>,
    log_path: PathBuf,
}

/// Interior state behind the RwLock — VecDeque plus a HashMap index
/// that maps run_id → logical sequence number. The logical offset
/// tracks how many entries have been popped from the front so the
/// HashMap values never need bulk adjustment.
struct RunStoreInner {
    runs: VecDeque<RunRecord>,
    index: HashMap<Uuid, usize>,
    /// Logical sequence number of the front element.
    base_seq: usize,
}

impl RunStoreInner {
    fn new(runs: VecDeque<RunRecord>) -> Self {
        let mut index = HashMap::with_capacity(runs.len());
        for (i, run) in runs.iter().enumerate() {
            index.insert(run.run_id, i);
        }
        Self {
            runs,
            index,
            base_seq: 0,
        }
    }

    fn get(&self, run_id: &Uuid) -> Option<&RunRecord> {
        let seq = *self.index.get(run_id)?;
        self.runs.get(seq - self.base_seq)
    }

    fn get_mut(&mut self, run_id: &Uuid) -> Option<&mut RunRecord> {
        let seq = *self.index.get(run_id)?;
        let idx = seq - self.base_seq;
        self.runs.get_mut(idx)
    }

    fn push_back(&mut self, run: RunRecord) {
        let seq = self.base_seq + self.runs.len();
        self.index.insert(run.run_id, seq);
        self.runs.push_back(run);
    }

    fn pop_front(&mut self) {
        if let Some(run) = self.runs.pop_front() {
            self.index.remove(&run.run_id);
            self.base_seq += 1;
        }
    }
}

impl RunStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("runs");
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join("runs.jsonl");

        // Last record per run_id wins; keep insertion order of first sight.
        let mut order: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, RunRecord> = HashMap::new();
        for run in read_jsonl::<RunRecord>(&log_path) {
            if !latest.contains_key(&run.run_id) {
                order.push(run.run_id);
            }
            latest.insert(run.run_id, run);
        }
        let mut runs = VecDeque::new();
        for id in order.into_iter().rev().take(MAX_RUNS_IN_MEMORY) {
            if let Some(run) = latest.remove(&id) {
                runs.push_front(run);
            }
        }

        Ok(Self {
            inner: RwLock::new(RunStoreInner::new(runs)),
            log_path,
        })
    }

    /// Insert a new run and persist it. Returns the run_id.
    pub fn insert(&self, run: RunRecord) -> Result<Uuid> {
        let run_id = run.run_id;
        append_jsonl(&self.log_path, &run)?;
        let mut inner = self.inner.write();
        inner.push_back(run);
        if inner.runs.len() > MAX_RUNS_IN_MEMORY {
            inner.pop_front();
        }
        Ok(run_id)
    }

    /// Update a run in-place by ID. Returns true if found.
    pub fn update<F>(&self, run_id: &Uuid, f: F) -> bool
    where
        F: FnOnce(&mut RunRecord),
    {
        let mut inner = self.inner.write();
        if let Some(run) = inner.get_mut(run_id) {
            f(run);
            return true;
        }
        false
    }

    /// Transition a run to a terminal status, exactly once.
    ///
    /// Returns `true` when this call performed the transition; `false`
    /// when the run was already terminal (the duplicate is ignored) or
    /// does not exist.
    pub fn finish_once(
        &self,
        run_id: &Uuid,
        status: RunStatus,
        error: Option<String>,
    ) -> bool {
        debug_assert!(status.is_terminal());
        let finished = {
            let mut inner = self.inner.write();
            let Some(run) = inner.get_mut(run_id) else {
                return false;
            };
            if run.status.is_terminal() {
                return false;
            }
            run.status = status;
            run.ended_at = Some(Utc::now());
            run.error = error;
            run.clone()
        };
        if let Err(e) = append_jsonl(&self.log_path, &finished) {
            tracing::warn!(run_id = %run_id, error = %e, "failed to persist terminal run state");
        }
        true
    }

    pub fn get(&self, run_id: &Uuid) -> Option<RunRecord> {
        self.inner.read().get(run_id).cloned()
    }

    /// Runs for a thread, newest first.
    pub fn list_by_thread(&self, thread_id: &Uuid) -> Vec<RunRecord> {
        self.inner
            .read()
            .runs
            .iter()
            .rev()
            .filter(|r| &r.thread_id == thread_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_run() -> RunRecord {
        RunRecord::new(Uuid::new_v4(), "instance-a")
    }

    #[test]
    fn insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let run = new_run();
        let run_id = store.insert(run).unwrap();
        let fetched = store.get(&run_id).unwrap();
        assert_eq!(fetched.status, RunStatus::Running);
        assert_eq!(fetched.instance_id, "instance-a");
    }

    #[test]
    fn finish_once_is_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let run_id = store.insert(new_run()).unwrap();
        assert!(store.finish_once(&run_id, RunStatus::Completed, None));
        // A duplicate terminal transition is ignored.
        assert!(!store.finish_once(&run_id, RunStatus::Failed, Some("late".into())));

        let fetched = store.get(&run_id).unwrap();
        assert_eq!(fetched.status, RunStatus::Completed);
        assert!(fetched.error.is_none());
    }

    #[test]
    fn finish_once_missing_run_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        assert!(!store.finish_once(&Uuid::new_v4(), RunStatus::Stopped, None));
    }

    #[test]
    fn reload_keeps_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let run_id = store.insert(new_run()).unwrap();
        store.finish_once(&run_id, RunStatus::Failed, Some("boom".into()));

        let store2 = RunStore::open(dir.path()).unwrap();
        let fetched = store2.get(&run_id).unwrap();
        assert_eq!(fetched.status, RunStatus::Failed);
        assert_eq!(fetched.error.as_deref(), Some("boom"));
    }

    #[test]
    fn list_by_thread_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let thread = Uuid::new_v4();
        let mut first = RunRecord::new(thread, "i");
        first.started_at = Utc::now() - chrono::Duration::seconds(5);
        let first_id = store.insert(first).unwrap();
        let second_id = store.insert(RunRecord::new(thread, "i")).unwrap();
        store.insert(new_run()).unwrap(); // other thread

        let listed = store.list_by_thread(&thread);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].run_id, second_id);
        assert_eq!(listed[1].run_id, first_id);
    }

    #[test]
    fn bounded_ring() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        for _ in 0..(MAX_RUNS_IN_MEMORY + 10) {
            store.insert(new_run()).unwrap();
        }
        assert_eq!(store.inner.read().runs.len(), MAX_RUNS_IN_MEMORY);
    }

    #[test]
    fn update_mutates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run_id = store.insert(new_run()).unwrap();

        assert!(store.update(&run_id, |r| {
            r.output_preview = Some("done".into());
        }));
        assert_eq!(
            store.get(&run_id).unwrap().output_preview.as_deref(),
            Some("done")
        );
        assert!(!store.update(&Uuid::new_v4(), |_| {}));
    }
}
