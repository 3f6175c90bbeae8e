use std::sync::Arc;

use al_bus::{ActiveRunSet, EventBus};
use al_domain::config::Config;
use al_providers::ProviderRegistry;
use al_store::Store;
use al_tools::{ThreadLockMap, ToolRegistry};

use crate::api::flags::FlagStore;
use crate::runtime::billing::BillingGuard;
use crate::runtime::stop::StopMap;

/// Shared application state passed to all API handlers and workers.
///
/// Built once at startup; everything behind `Arc`. This is the explicit
/// services struct — no global singletons.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Store,
    pub bus: Arc<EventBus>,
    pub llm: Arc<ProviderRegistry>,
    pub tools: Arc<ToolRegistry>,

    // ── Runtime ──────────────────────────────────────────────────────
    /// Per-run stop flags (cooperative cancellation).
    pub stops: Arc<StopMap>,
    /// Runs this instance is executing, with heartbeat TTLs.
    pub active_runs: Arc<ActiveRunSet>,
    /// Per-thread task-list serialization locks.
    pub tasklist_locks: Arc<ThreadLockMap>,
    /// Daily usage limits per account.
    pub billing: Arc<BillingGuard>,

    // ── Misc ─────────────────────────────────────────────────────────
    pub flags: Arc<FlagStore>,
    pub instance_id: String,
    /// SHA-256 digest of the API bearer token. `None` = auth disabled.
    pub api_token_hash: Option<Vec<u8>>,
}
