use serde::{Deserialize, Serialize};

/// Shared error type used across all agentloop crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The model's rate limiter rejected the request (retryable).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The assembled prompt exceeds the model's context window.
    #[error("context window exceeded: {0}")]
    ContextWindow(String),

    /// The provider refused the request on content-policy grounds.
    #[error("content policy: {0}")]
    ContentPolicy(String),

    /// All LLM retries were exhausted.
    #[error("llm retries exhausted: {0}")]
    LlmExhausted(String),

    /// The account hit its billing/usage limit.
    #[error("billing limit: {0}")]
    BillingLimit(String),

    /// The run was stopped cooperatively.
    #[error("agent stopped")]
    AgentStopped,

    /// Tool arguments failed schema validation.
    #[error("invalid tool arguments: {0}")]
    ToolArgsInvalid(String),

    #[error("tool {tool}: {message}")]
    ToolRuntime { tool: String, message: String },

    #[error("sandbox: {0}")]
    Sandbox(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Kind attached to a terminal `failed` status, telling clients *why*
/// the run ended (spec'd set; serialized snake_case on status events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ContextWindow,
    LlmExhausted,
    ContentPolicy,
    Billing,
    Abandoned,
    Tool,
    Unrecoverable,
}

impl Error {
    /// Transient LLM failures are retried with backoff; everything else
    /// is surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Timeout(_) | Error::RateLimited(_)
        )
    }

    /// Map a terminal worker error to the failure kind reported on the
    /// final status event. Returns `None` for non-failure terminations
    /// (e.g. a cooperative stop).
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::ContextWindow(_) => Some(FailureKind::ContextWindow),
            Error::LlmExhausted(_) => Some(FailureKind::LlmExhausted),
            Error::ContentPolicy(_) => Some(FailureKind::ContentPolicy),
            Error::BillingLimit(_) => Some(FailureKind::Billing),
            Error::AgentStopped => None,
            _ => Some(FailureKind::Unrecoverable),
        }
    }
}
