//! Per-run append-only response log.
//!
//! The log owns `seq` assignment: append is the linearization point for
//! a run's event stream. Entries are trimmed past `max_entries` and the
//! whole log expires `ttl` after its last append.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use al_domain::event::{EventPayload, RunEvent};

pub struct ResponseLog {
    run_id: Uuid,
    inner: Mutex<LogInner>,
    max_entries: usize,
}

struct LogInner {
    events: VecDeque<RunEvent>,
    next_seq: u64,
    last_append: Instant,
}

impl ResponseLog {
    pub fn new(run_id: Uuid, max_entries: usize) -> Self {
        Self {
            run_id,
            inner: Mutex::new(LogInner {
                events: VecDeque::new(),
                next_seq: 1,
                last_append: Instant::now(),
            }),
            max_entries,
        }
    }

    /// Append a payload, assigning the next `seq`. Returns the full event.
    pub fn append(&self, payload: EventPayload) -> RunEvent {
        let mut inner = self.inner.lock();
        let event = RunEvent {
            run_id: self.run_id,
            seq: inner.next_seq,
            created_at: Utc::now(),
            payload,
        };
        inner.next_seq += 1;
        inner.last_append = Instant::now();
        inner.events.push_back(event.clone());
        while inner.events.len() > self.max_entries {
            inner.events.pop_front();
        }
        event
    }

    /// Events with `seq > from_seq`, in order.
    pub fn events_after(&self, from_seq: u64) -> Vec<RunEvent> {
        let inner = self.inner.lock();
        inner
            .events
            .iter()
            .filter(|e| e.seq > from_seq)
            .cloned()
            .collect()
    }

    /// Highest assigned `seq`, or 0 when empty.
    pub fn last_seq(&self) -> u64 {
        self.inner.lock().next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Whether the latest entry is a terminal status.
    pub fn has_terminal(&self) -> bool {
        self.inner
            .lock()
            .events
            .iter()
            .any(|e| e.payload.is_terminal())
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.inner.lock().last_append.elapsed() > ttl
    }
}
