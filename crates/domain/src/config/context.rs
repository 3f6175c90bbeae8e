use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context window management
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Estimated-token threshold that triggers history compression.
    #[serde(default = "d_soft_ceiling")]
    pub soft_ceiling_tokens: usize,
    /// Number of most-recent user turns compression never rewrites.
    #[serde(default = "d_tail")]
    pub tail_preserve_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            soft_ceiling_tokens: 120_000,
            tail_preserve_turns: 4,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_soft_ceiling() -> usize {
    120_000
}
fn d_tail() -> usize {
    4
}
