//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, Together, and any other endpoint
//! that follows the OpenAI chat completions contract.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{classify_provider_error, from_reqwest};
use al_domain::chat::{
    ContentPart, Message, MessageContent, Role, ToolCall, ToolChoice, ToolDefinition,
};
use al_domain::config::ProviderConfig;
use al_domain::error::{Error, Result};
use al_domain::stream::{BoxStream, StreamEvent, Usage};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    /// The API key is read once from the configured env var; an empty
    /// or missing key is allowed (requests will 401 until it is set).
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!(
                provider = %cfg.id,
                env_var = %cfg.api_key_env,
                "no API key in environment; provider will fail until it is set"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg
                .default_model
                .clone()
                .unwrap_or_else(|| "gpt-4o".into()),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() && req.tool_choice != ToolChoice::None {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = match req.tool_choice {
                ToolChoice::Auto => Value::String("auto".into()),
                ToolChoice::Required => Value::String("required".into()),
                ToolChoice::None => Value::String("none".into()),
            };
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if req.enable_thinking {
            if let Some(effort) = &req.reasoning_effort {
                body["reasoning_effort"] = Value::String(effort.clone());
            }
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => {
            let text = msg.content.extract_all_text();
            serde_json::json!({
                "role": role_to_str(msg.role),
                "content": text,
            })
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => {
            text_parts.push(t.clone());
        }
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    if text_parts.is_empty() {
        obj["content"] = Value::Null;
    } else {
        obj["content"] = Value::String(text_parts.join("\n"));
    }
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } = part
                {
                    return serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    });
                }
            }
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": ""})
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "tool",
            "tool_call_id": "",
            "content": t,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let tool_calls = parse_openai_tool_calls(message);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value =
                serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            Some(ToolCall {
                call_id,
                tool_name,
                arguments,
            })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reassembles SSE events from network chunks.
///
/// OpenAI terminates each event with a blank line and puts the whole
/// JSON chunk on a single `data:` line, so all we track is the
/// unterminated remainder between reads.
struct SseBuffer {
    pending: String,
}

impl SseBuffer {
    fn new() -> Self {
        Self {
            pending: String::new(),
        }
    }

    /// Feed one network chunk; returns the `data:` payloads of every
    /// event the chunk completed.
    fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut payloads = Vec::new();
        while let Some(boundary) = self.pending.find("\n\n") {
            let block: String = self.pending.drain(..boundary + 2).collect();
            payloads.extend(data_payloads(&block));
        }
        payloads
    }

    /// The body closed; whatever is still buffered is the last event.
    fn flush(&mut self) -> Vec<String> {
        data_payloads(&std::mem::take(&mut self.pending))
    }
}

/// The trimmed, non-empty `data:` payloads of one event block.
/// `event:`, `id:`, and `retry:` fields carry nothing we use.
fn data_payloads(block: &str) -> Vec<String> {
    block
        .lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode one `data:` payload into a stream event. Returns `None` for
/// chunks that carry nothing (e.g. an empty delta).
fn parse_sse_data(data: &str) -> Option<Result<StreamEvent>> {
    if data == "[DONE]" {
        return Some(Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        }));
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(Error::Json(e))),
    };

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    // Usage-only chunk (stream_options.include_usage).
    if choice.is_none() {
        if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
            return Some(Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            }));
        }
        return None;
    }

    let choice = choice?;
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    // Finish reason.
    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_openai_usage);
        return Some(Ok(StreamEvent::Done {
            usage,
            finish_reason: Some(fr.to_string()),
        }));
    }

    // Tool call deltas.
    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let idx_str = tc
                .get("index")
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                .to_string();

            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                return Some(Ok(StreamEvent::ToolCallStarted {
                    call_id: id.to_string(),
                    tool_name: name.to_string(),
                }));
            }

            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                return Some(Ok(StreamEvent::ToolCallDelta {
                    call_id: idx_str,
                    delta: args.to_string(),
                }));
            }
        }
    }

    // Reasoning content (DeepSeek, etc.)
    if let Some(text) = delta.get("reasoning_content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return Some(Ok(StreamEvent::Thinking {
                text: text.to_string(),
            }));
        }
    }

    // Text content delta.
    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return Some(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    None
}

/// Turn the streaming HTTP response into a stream of events: buffer
/// chunks, decode completed SSE events, and guarantee exactly one
/// `Done` even when the body ends without a finish chunk.
fn openai_event_stream(response: reqwest::Response) -> BoxStream<'static, Result<StreamEvent>> {
    Box::pin(async_stream::stream! {
        let mut response = response;
        let mut buffer = SseBuffer::new();
        let mut finished = false;

        loop {
            let payloads = match response.chunk().await {
                Ok(Some(bytes)) => buffer.push(&String::from_utf8_lossy(&bytes)),
                Ok(None) => {
                    for payload in buffer.flush() {
                        if let Some(event) = parse_sse_data(&payload) {
                            if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                finished = true;
                            }
                            yield event;
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            };
            for payload in payloads {
                if let Some(event) = parse_sse_data(&payload) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        finished = true;
                    }
                    yield event;
                }
            }
        }

        if !finished {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(classify_provider_error(&self.id, status.as_u16(), &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, true);

        tracing::debug!(provider = %self.id, url = %url, "stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(classify_provider_error(&self.id, status.as_u16(), &err_text));
        }

        Ok(openai_event_stream(resp))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider {
            id: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "test".into(),
            default_model: "gpt-4o".into(),
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn body_includes_tools_and_choice() {
        let p = provider();
        let req = ChatRequest {
            messages: vec![Message::user("hi")],
            tools: vec![ToolDefinition {
                name: "execute_command".into(),
                description: "run".into(),
                parameters: serde_json::json!({"type":"object","properties":{}}),
            }],
            tool_choice: ToolChoice::Required,
            ..Default::default()
        };
        let body = p.build_chat_body(&req, false);
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["tools"][0]["function"]["name"], "execute_command");
    }

    #[test]
    fn body_omits_tools_when_choice_is_none() {
        let p = provider();
        let req = ChatRequest {
            messages: vec![Message::user("hi")],
            tools: vec![ToolDefinition {
                name: "execute_command".into(),
                description: "run".into(),
                parameters: serde_json::json!({}),
            }],
            tool_choice: ToolChoice::None,
            ..Default::default()
        };
        let body = p.build_chat_body(&req, false);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn body_carries_reasoning_effort_when_thinking() {
        let p = provider();
        let req = ChatRequest {
            messages: vec![Message::user("hi")],
            enable_thinking: true,
            reasoning_effort: Some("high".into()),
            ..Default::default()
        };
        let body = p.build_chat_body(&req, false);
        assert_eq!(body["reasoning_effort"], "high");
    }

    #[test]
    fn assistant_with_tool_use_serializes_tool_calls() {
        let msg = Message {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "calling".into() },
                ContentPart::ToolUse {
                    id: "tc_1".into(),
                    name: "web_search".into(),
                    input: serde_json::json!({"query": "rust"}),
                },
            ]),
        };
        let v = msg_to_openai(&msg);
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "web_search");
    }

    #[test]
    fn parses_full_response_with_tool_calls() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "execute_command", "arguments": "{\"command\":\"ls\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].tool_name, "execute_command");
        assert_eq!(resp.tool_calls[0].arguments["command"], "ls");
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    // ── SSE buffer ─────────────────────────────────────────────────

    #[test]
    fn buffer_single_complete_event() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("event: message\ndata: {\"hello\":\"world\"}\n\n");
        assert_eq!(payloads, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.pending.is_empty());
    }

    #[test]
    fn buffer_multiple_events_in_one_chunk() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data: first\n\ndata: second\n\n");
        assert_eq!(payloads, vec!["first", "second"]);
    }

    #[test]
    fn buffer_partial_event_stays_pending() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data: complete\n\ndata: partial");
        assert_eq!(payloads, vec!["complete"]);
        assert_eq!(buf.pending, "data: partial");

        // The rest of the event arrives in the next chunk.
        let payloads = buf.push(" tail\n\n");
        assert_eq!(payloads, vec!["partial tail"]);
        assert!(buf.pending.is_empty());
    }

    #[test]
    fn buffer_empty_chunk_yields_nothing() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("").is_empty());
        assert!(buf.flush().is_empty());
        assert!(buf.pending.is_empty());
    }

    #[test]
    fn buffer_skips_empty_data_lines() {
        let mut buf = SseBuffer::new();
        // A whitespace-only payload is a keep-alive, not an event.
        assert!(buf.push("data: \n\n").is_empty());
        assert!(buf.push("data:\n\n").is_empty());
    }

    #[test]
    fn buffer_trims_whitespace_around_payload() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data:   {\"key\":\"val\"}  \n\n");
        assert_eq!(payloads, vec!["{\"key\":\"val\"}"]);
    }

    #[test]
    fn buffer_ignores_non_data_fields() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        assert_eq!(payloads, vec!["payload"]);
    }

    #[test]
    fn buffer_flush_recovers_unterminated_event() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("data: last chunk").is_empty());
        assert_eq!(buf.flush(), vec!["last chunk"]);
        assert!(buf.pending.is_empty());
    }

    // ── Payload decoding ───────────────────────────────────────────

    #[test]
    fn stream_parse_token_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert!(matches!(
            parse_sse_data(data),
            Some(Ok(StreamEvent::Token { text })) if text == "Hel"
        ));
    }

    #[test]
    fn stream_parse_empty_delta_is_nothing() {
        let data = r#"{"choices":[{"delta":{"content":""}}]}"#;
        assert!(parse_sse_data(data).is_none());
    }

    #[test]
    fn stream_parse_done_sentinel() {
        assert!(matches!(
            parse_sse_data("[DONE]"),
            Some(Ok(StreamEvent::Done { .. }))
        ));
    }

    #[test]
    fn stream_parse_tool_call_start_and_delta() {
        let start = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"web_search"}}]}}]}"#;
        assert!(matches!(
            parse_sse_data(start),
            Some(Ok(StreamEvent::ToolCallStarted { call_id, tool_name }))
                if call_id == "call_1" && tool_name == "web_search"
        ));

        let delta = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"qu"}}]}}]}"#;
        assert!(matches!(
            parse_sse_data(delta),
            Some(Ok(StreamEvent::ToolCallDelta { delta, .. })) if delta == "{\"qu"
        ));
    }

    #[test]
    fn stream_parse_usage_only_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":7,"completion_tokens":3,"total_tokens":10}}"#;
        assert!(matches!(
            parse_sse_data(data),
            Some(Ok(StreamEvent::Done { usage: Some(u), .. })) if u.total_tokens == 10
        ));
    }

    #[test]
    fn stream_parse_malformed_json_is_an_error() {
        assert!(matches!(
            parse_sse_data("{not json"),
            Some(Err(Error::Json(_)))
        ));
    }
}
