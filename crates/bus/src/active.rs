//! Instance-scoped active-run set with TTL entries.
//!
//! Each instance tracks the runs it is executing; workers refresh their
//! entry on a heartbeat. Entries whose TTL lapses without a refresh are
//! handed to the reaper, which marks those runs abandoned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

pub struct ActiveRunSet {
    entries: Mutex<HashMap<Uuid, Instant>>,
    ttl: Duration,
}

impl ActiveRunSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a run (or refresh it if already present).
    pub fn add(&self, run_id: Uuid) {
        self.entries.lock().insert(run_id, Instant::now() + self.ttl);
    }

    /// Refresh a run's TTL. Idempotent; a heartbeat for an unknown run
    /// re-registers it.
    pub fn heartbeat(&self, run_id: Uuid) {
        self.add(run_id);
    }

    pub fn remove(&self, run_id: &Uuid) {
        self.entries.lock().remove(run_id);
    }

    pub fn contains(&self, run_id: &Uuid) -> bool {
        self.entries.lock().contains_key(run_id)
    }

    /// Collect and remove entries whose TTL has lapsed.
    pub fn take_expired(&self) -> Vec<Uuid> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<Uuid> = entries
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_contains_remove() {
        let set = ActiveRunSet::new(Duration::from_secs(60));
        let run = Uuid::new_v4();
        set.add(run);
        assert!(set.contains(&run));
        set.remove(&run);
        assert!(!set.contains(&run));
    }

    #[test]
    fn expired_entries_are_taken_once() {
        let set = ActiveRunSet::new(Duration::from_millis(0));
        let run = Uuid::new_v4();
        set.add(run);
        std::thread::sleep(Duration::from_millis(5));
        let expired = set.take_expired();
        assert_eq!(expired, vec![run]);
        assert!(set.take_expired().is_empty());
        assert!(!set.contains(&run));
    }

    #[test]
    fn heartbeat_extends_ttl() {
        let set = ActiveRunSet::new(Duration::from_secs(60));
        let run = Uuid::new_v4();
        set.add(run);
        set.heartbeat(run);
        assert!(set.take_expired().is_empty());
        assert!(set.contains(&run));
    }

    #[test]
    fn heartbeat_for_unknown_run_registers_it() {
        let set = ActiveRunSet::new(Duration::from_secs(60));
        let run = Uuid::new_v4();
        set.heartbeat(run);
        assert!(set.contains(&run));
    }
}
