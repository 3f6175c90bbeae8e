//! Streaming event bus — per-run append-only logs, pub/sub channels,
//! control channels, and the instance-scoped active-run set.
//!
//! Every event is appended to the run's log (which assigns `seq`) and
//! then published to the run's broadcast channel. Subscribers replay
//! from the log and merge the live feed, deduping on `seq`, so any
//! number of clients on any instance observe the same gap-free,
//! strictly ascending sequence.

pub mod active;
pub mod bus;
pub mod log;

pub use active::ActiveRunSet;
pub use bus::{ControlMessage, EventBus};
pub use log::ResponseLog;
