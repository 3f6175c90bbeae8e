use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model used when neither the request nor the agent picks one.
    /// Format: "provider_id/model_name" or a bare model on the default
    /// provider.
    #[serde(default = "d_default_model")]
    pub default_model: String,
    #[serde(default = "d_8192")]
    pub max_tokens: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Abort a stream with no delta for this long, then retry.
    #[serde(default = "d_60")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Summarizer model for history compression. Falls back to the
    /// executing provider when unset.
    #[serde(default)]
    pub summarizer_model: Option<String>,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: d_default_model(),
            max_tokens: 8192,
            temperature: 0.2,
            idle_timeout_seconds: 60,
            max_retries: 3,
            summarizer_model: None,
            providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider id; model specs reference it as "<id>/<model>".
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub default_model: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_default_model() -> String {
    "openai/gpt-4o".into()
}
fn d_8192() -> u32 {
    8192
}
fn d_temperature() -> f32 {
    0.2
}
fn d_60() -> u64 {
    60
}
fn d_3() -> u32 {
    3
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
