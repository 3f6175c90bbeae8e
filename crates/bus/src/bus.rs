//! The event bus proper: append-then-publish producers, replay-then-live
//! subscribers, and per-run control channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use al_domain::config::BusConfig;
use al_domain::event::{EventPayload, RunEvent};
use al_domain::stream::BoxStream;

use crate::log::ResponseLog;

/// Messages on a run's control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Cooperative stop requested by a client.
    Stop,
    /// Process-wide shutdown; workers persist `stopped` and exit.
    Shutdown,
}

struct RunChannel {
    log: Arc<ResponseLog>,
    events: broadcast::Sender<RunEvent>,
    control: broadcast::Sender<ControlMessage>,
}

/// Per-run event delivery. Channel names are run-scoped, so any
/// instance holding this bus can serve any run it has seen.
pub struct EventBus {
    config: BusConfig,
    channels: RwLock<HashMap<Uuid, RunChannel>>,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            channels: RwLock::new(HashMap::new()),
        }
    }

    fn channel(&self, run_id: Uuid) -> (Arc<ResponseLog>, broadcast::Sender<RunEvent>) {
        let mut channels = self.channels.write();
        let entry = channels.entry(run_id).or_insert_with(|| RunChannel {
            log: Arc::new(ResponseLog::new(run_id, self.config.log_max_entries)),
            events: broadcast::channel(self.config.channel_capacity).0,
            control: broadcast::channel(8).0,
        });
        (entry.log.clone(), entry.events.clone())
    }

    /// Append an event to the run's log and publish it. The append is
    /// the linearization point; `seq` is assigned there.
    pub fn publish(&self, run_id: Uuid, payload: EventPayload) -> RunEvent {
        let (log, events) = self.channel(run_id);
        let event = log.append(payload);
        // No subscribers is fine; the log still has the event.
        let _ = events.send(event.clone());
        event
    }

    /// Replayed history of a run with `seq > from_seq`.
    pub fn replay(&self, run_id: Uuid, from_seq: u64) -> Vec<RunEvent> {
        let channels = self.channels.read();
        match channels.get(&run_id) {
            Some(entry) => entry.log.events_after(from_seq),
            None => Vec::new(),
        }
    }

    /// Whether the run's log already holds a terminal status.
    pub fn is_terminal(&self, run_id: Uuid) -> bool {
        let channels = self.channels.read();
        channels
            .get(&run_id)
            .map(|e| e.log.has_terminal())
            .unwrap_or(false)
    }

    /// Subscribe to a run's event stream, starting after `from_seq`.
    ///
    /// Protocol: subscribe to the live channel first, then replay the
    /// log, then forward live events — deduping on `seq` since the two
    /// phases overlap. The stream ends after a terminal status. A
    /// lagged receiver recovers by re-reading the log, preserving the
    /// gap-free ordering guarantee.
    pub fn subscribe(&self, run_id: Uuid, from_seq: u64) -> BoxStream<'static, RunEvent> {
        let (log, events) = self.channel(run_id);
        let mut rx = events.subscribe();

        let stream = async_stream::stream! {
            let mut last_seq = from_seq;

            for event in log.events_after(last_seq) {
                last_seq = event.seq;
                let terminal = event.payload.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }

            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.seq <= last_seq {
                            continue;
                        }
                        // A gap means we missed a broadcast; fill from the log.
                        if event.seq > last_seq + 1 {
                            for missed in log.events_after(last_seq) {
                                if missed.seq >= event.seq {
                                    break;
                                }
                                last_seq = missed.seq;
                                let terminal = missed.payload.is_terminal();
                                yield missed;
                                if terminal {
                                    return;
                                }
                            }
                        }
                        last_seq = event.seq;
                        let terminal = event.payload.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(run_id = %run_id, missed = n, "subscriber lagged; recovering from log");
                        for event in log.events_after(last_seq) {
                            last_seq = event.seq;
                            let terminal = event.payload.is_terminal();
                            yield event;
                            if terminal {
                                return;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Producer gone; drain whatever the log still has.
                        for event in log.events_after(last_seq) {
                            last_seq = event.seq;
                            let terminal = event.payload.is_terminal();
                            yield event;
                            if terminal {
                                return;
                            }
                        }
                        return;
                    }
                }
            }
        };

        Box::pin(stream)
    }

    // ── Control channel ───────────────────────────────────────────

    /// Publish a control message for a run. Returns the number of
    /// listening workers (0 when none are subscribed yet — the stop
    /// flag covers that window).
    pub fn publish_control(&self, run_id: Uuid, message: ControlMessage) -> usize {
        let mut channels = self.channels.write();
        let entry = channels.entry(run_id).or_insert_with(|| RunChannel {
            log: Arc::new(ResponseLog::new(run_id, self.config.log_max_entries)),
            events: broadcast::channel(self.config.channel_capacity).0,
            control: broadcast::channel(8).0,
        });
        entry.control.send(message).unwrap_or(0)
    }

    pub fn subscribe_control(&self, run_id: Uuid) -> broadcast::Receiver<ControlMessage> {
        let mut channels = self.channels.write();
        let entry = channels.entry(run_id).or_insert_with(|| RunChannel {
            log: Arc::new(ResponseLog::new(run_id, self.config.log_max_entries)),
            events: broadcast::channel(self.config.channel_capacity).0,
            control: broadcast::channel(8).0,
        });
        entry.control.subscribe()
    }

    /// Broadcast `Shutdown` to every known run (graceful process exit).
    pub fn shutdown_all(&self) {
        let channels = self.channels.read();
        for (run_id, entry) in channels.iter() {
            if entry.control.send(ControlMessage::Shutdown).is_ok() {
                tracing::debug!(run_id = %run_id, "shutdown signalled");
            }
        }
    }

    /// Drop logs whose TTL elapsed since the last append.
    pub fn sweep_expired(&self) -> usize {
        let ttl = Duration::from_secs(self.config.log_ttl_seconds);
        let mut channels = self.channels.write();
        let before = channels.len();
        channels.retain(|_, entry| !entry.log.is_expired(ttl));
        before - channels.len()
    }

    pub fn run_count(&self) -> usize {
        self.channels.read().len()
    }
}
