use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Web search / scrape adapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "d_search_url")]
    pub search_base_url: String,
    /// Environment variable holding the search API key.
    #[serde(default = "d_search_key_env")]
    pub search_api_key_env: String,
    #[serde(default = "d_scrape_url")]
    pub scrape_base_url: String,
    /// Environment variable holding the scrape API key.
    #[serde(default = "d_scrape_key_env")]
    pub scrape_api_key_env: String,
    /// Hard timeout on outbound search/scrape requests.
    #[serde(default = "d_20")]
    pub timeout_seconds: u64,
    /// Cap on scraped page text returned to the model.
    #[serde(default = "d_max_chars")]
    pub max_text_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_base_url: d_search_url(),
            search_api_key_env: d_search_key_env(),
            scrape_base_url: d_scrape_url(),
            scrape_api_key_env: d_scrape_key_env(),
            timeout_seconds: 20,
            max_text_chars: 250_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_search_url() -> String {
    "https://api.tavily.com".into()
}
fn d_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn d_scrape_url() -> String {
    "https://api.firecrawl.dev".into()
}
fn d_scrape_key_env() -> String {
    "FIRECRAWL_API_KEY".into()
}
fn d_20() -> u64 {
    20
}
fn d_max_chars() -> usize {
    250_000
}
