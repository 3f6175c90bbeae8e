//! LLM provider adapters.
//!
//! The runtime talks to models through [`LlmProvider`]; adapters
//! translate between the internal types and each provider's wire
//! format. Transient failures are retried with capped exponential
//! backoff, and streams carry an idle-timeout guard.

pub mod openai_compat;
pub mod registry;
pub mod retry;
pub mod traits;
pub mod util;

pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
pub use retry::{backoff_delay, idle_guard, with_retries};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
