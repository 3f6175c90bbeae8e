//! Per-run stop flags.
//!
//! Each running worker gets a `StopFlag`. `stop()` signals the runtime
//! to end the current run cleanly; the worker checks the flag at every
//! loop boundary (before LLM calls, per stream delta, before each tool
//! dispatch), so a stop that arrives before the worker subscribes to
//! its control channel is still observed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// A stop flag checked by the run loop.
#[derive(Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Tracks stop flags for the runs this instance is executing.
#[derive(Default)]
pub struct StopMap {
    flags: Mutex<HashMap<Uuid, StopFlag>>,
}

impl StopMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a flag for a run. If the run already has a
    /// flag (a stop raced the start), the existing one is returned so
    /// the earlier stop is not lost.
    pub fn register(&self, run_id: Uuid) -> StopFlag {
        self.flags
            .lock()
            .entry(run_id)
            .or_insert_with(StopFlag::new)
            .clone()
    }

    /// Signal a run to stop. Registers the flag when the worker has not
    /// started yet, so the signal is level-triggered either way.
    pub fn stop(&self, run_id: Uuid) {
        self.flags
            .lock()
            .entry(run_id)
            .or_insert_with(StopFlag::new)
            .stop();
    }

    pub fn remove(&self, run_id: &Uuid) {
        self.flags.lock().remove(run_id);
    }

    pub fn is_running(&self, run_id: &Uuid) -> bool {
        self.flags.lock().contains_key(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_lifecycle() {
        let flag = StopFlag::new();
        assert!(!flag.is_stopped());
        flag.stop();
        assert!(flag.is_stopped());
    }

    #[test]
    fn clones_share_state() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        flag.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn stop_before_register_is_observed() {
        let map = StopMap::new();
        let run = Uuid::new_v4();
        map.stop(run);
        // The worker registers afterwards and must see the stop.
        let flag = map.register(run);
        assert!(flag.is_stopped());
    }

    #[test]
    fn stop_after_register_is_observed() {
        let map = StopMap::new();
        let run = Uuid::new_v4();
        let flag = map.register(run);
        assert!(!flag.is_stopped());
        map.stop(run);
        assert!(flag.is_stopped());
    }

    #[test]
    fn remove_is_idempotent() {
        let map = StopMap::new();
        let run = Uuid::new_v4();
        map.register(run);
        map.remove(&run);
        map.remove(&run);
        assert!(!map.is_running(&run));
    }
}
