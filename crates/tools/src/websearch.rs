//! Web search and page scraping via external REST services.
//!
//! Both adapters are thin HTTP clients with hard timeouts and output
//! caps; missing API keys degrade to tool errors, never crashes.

use std::time::Duration;

use serde_json::Value;

use al_domain::config::SearchConfig;
use al_domain::error::Result;

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

fn search_caps() -> ToolCapabilities {
    ToolCapabilities {
        parallel_safe: true,
        ..Default::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// web_search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebSearchTool {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.search_api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| al_domain::error::Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn format_results(body: &Value) -> String {
        let mut out = String::new();
        if let Some(answer) = body.get("answer").and_then(|v| v.as_str()) {
            out.push_str(&format!("Answer: {answer}\n\n"));
        }
        if let Some(results) = body.get("results").and_then(|v| v.as_array()) {
            for (i, result) in results.iter().enumerate() {
                let title = result.get("title").and_then(|v| v.as_str()).unwrap_or("");
                let url = result.get("url").and_then(|v| v.as_str()).unwrap_or("");
                let content = result.get("content").and_then(|v| v.as_str()).unwrap_or("");
                out.push_str(&format!("{}. {title}\n   {url}\n   {content}\n", i + 1));
            }
        }
        if out.is_empty() {
            out.push_str("no results");
        }
        out
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns ranked results with titles, URLs, and content snippets."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "max_results": { "type": "integer", "description": "Max results (default 10)" }
            },
            "required": ["query"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="web_search">
<parameter name="query">rust async runtime comparison</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        search_caps()
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(api_key) = &self.api_key else {
            return ToolResult::error("web search is not configured (missing API key)");
        };
        let query = args["query"].as_str().unwrap_or_default();
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(10)
            .min(20);

        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": true,
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => ToolResult::ok(Self::format_results(&body)),
                Err(e) => ToolResult::error(format!("bad search response: {e}")),
            },
            Ok(resp) => ToolResult::error(format!("search failed: HTTP {}", resp.status())),
            Err(e) => ToolResult::error(format!("search request failed: {e}")),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// scrape_webpage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ScrapeWebpageTool {
    base_url: String,
    api_key: Option<String>,
    max_text_chars: usize,
    client: reqwest::Client,
}

impl ScrapeWebpageTool {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.scrape_api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(30)))
            .build()
            .map_err(|e| al_domain::error::Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: config.scrape_base_url.trim_end_matches('/').to_string(),
            api_key,
            max_text_chars: config.max_text_chars,
            client,
        })
    }
}

#[async_trait::async_trait]
impl Tool for ScrapeWebpageTool {
    fn name(&self) -> &str {
        "scrape_webpage"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its content as markdown."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to scrape" }
            },
            "required": ["url"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            parallel_safe: true,
            long_running: true,
            ..Default::default()
        }
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(api_key) = &self.api_key else {
            return ToolResult::error("web scraping is not configured (missing API key)");
        };
        let url = args["url"].as_str().unwrap_or_default();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolResult::error(format!("invalid url '{url}' (http/https only)"));
        }

        let body = serde_json::json!({
            "url": url,
            "formats": ["markdown"],
        });

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => {
                    let markdown = body
                        .pointer("/data/markdown")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    let mut text = markdown.to_string();
                    if text.len() > self.max_text_chars {
                        let mut end = self.max_text_chars;
                        while !text.is_char_boundary(end) && end > 0 {
                            end -= 1;
                        }
                        text.truncate(end);
                        text.push_str("\n[content truncated]");
                    }
                    if text.is_empty() {
                        ToolResult::error("page had no extractable content")
                    } else {
                        ToolResult::ok(text)
                    }
                }
                Err(e) => ToolResult::error(format!("bad scrape response: {e}")),
            },
            Ok(resp) => ToolResult::error(format!("scrape failed: HTTP {}", resp.status())),
            Err(e) => ToolResult::error(format!("scrape request failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_results_lists_hits() {
        let body = serde_json::json!({
            "answer": "Rust is fast.",
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "content": "systems language"},
                {"title": "Tokio", "url": "https://tokio.rs", "content": "async runtime"}
            ]
        });
        let text = WebSearchTool::format_results(&body);
        assert!(text.contains("Answer: Rust is fast."));
        assert!(text.contains("1. Rust"));
        assert!(text.contains("2. Tokio"));
        assert!(text.contains("https://tokio.rs"));
    }

    #[test]
    fn format_results_empty() {
        assert_eq!(WebSearchTool::format_results(&serde_json::json!({})), "no results");
    }
}
