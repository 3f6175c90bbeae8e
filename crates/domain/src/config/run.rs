use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run controller / turn loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum LLM calls per run before the loop force-stops.
    #[serde(default = "d_100")]
    pub max_iterations: u32,
    /// Automatic continuations after a tool round (native style).
    #[serde(default = "d_25")]
    pub native_max_auto_continues: u32,
    /// Heartbeat interval; the active-run TTL is three heartbeats.
    #[serde(default = "d_30")]
    pub heartbeat_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            native_max_auto_continues: 25,
            heartbeat_seconds: 30,
        }
    }
}

impl RunConfig {
    /// Active-run entries expire after this many seconds without a
    /// heartbeat; the reaper then marks the run abandoned.
    pub fn active_ttl_seconds(&self) -> u64 {
        self.heartbeat_seconds * 3
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_100() -> u32 {
    100
}
fn d_25() -> u32 {
    25
}
fn d_30() -> u64 {
    30
}
