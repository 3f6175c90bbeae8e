use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Root under which each project gets a workspace directory.
    #[serde(default = "d_workspace_root")]
    pub workspace_root: std::path::PathBuf,
    /// Hard timeout for a single sandbox command.
    #[serde(default = "d_timeout")]
    pub exec_timeout_seconds: u64,
    /// Captured output is truncated past this size.
    #[serde(default = "d_max_output")]
    pub max_output_chars: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_root: d_workspace_root(),
            exec_timeout_seconds: 300,
            max_output_chars: 100_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_workspace_root() -> std::path::PathBuf {
    std::path::PathBuf::from("./data/workspaces")
}
fn d_timeout() -> u64 {
    300
}
fn d_max_output() -> usize {
    100_000
}
