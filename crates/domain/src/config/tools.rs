use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Timeout for ordinary tool calls.
    #[serde(default = "d_30")]
    pub default_timeout_seconds: u64,
    /// Timeout for tools flagged `long_running`.
    #[serde(default = "d_1800")]
    pub long_timeout_seconds: u64,
    /// Timeout for build-class tools (scaffolders).
    #[serde(default = "d_3600")]
    pub build_timeout_seconds: u64,
    /// Concurrency cap for a parallel-safe tool group within one turn.
    #[serde(default = "d_4")]
    pub parallel_safe_limit: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 30,
            long_timeout_seconds: 1800,
            build_timeout_seconds: 3600,
            parallel_safe_limit: 4,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_30() -> u64 {
    30
}
fn d_1800() -> u64 {
    1800
}
fn d_3600() -> u64 {
    3600
}
fn d_4() -> usize {
    4
}
