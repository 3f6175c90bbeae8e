use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event bus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Response logs expire this long after the last append.
    #[serde(default = "d_86400")]
    pub log_ttl_seconds: u64,
    /// Oldest entries are trimmed past this count.
    #[serde(default = "d_10000")]
    pub log_max_entries: usize,
    /// Per-run broadcast channel capacity; slow subscribers past this
    /// lag are dropped and must reconnect with `from_seq`.
    #[serde(default = "d_256")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            log_ttl_seconds: 86_400,
            log_max_entries: 10_000,
            channel_capacity: 256,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_86400() -> u64 {
    86_400
}
fn d_10000() -> usize {
    10_000
}
fn d_256() -> usize {
    256
}
