//! The turn loop: drive "LLM call → parse tool calls → execute tools →
//! feed results back" until the model produces a final answer, a
//! terminal tool fires, the iteration budget runs out, or a stop
//! arrives.
//!
//! All output flows through the event bus; the controller around this
//! loop owns the terminal status so it is emitted exactly once.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use al_domain::chat::{Message, ToolCall, ToolCallStyle, ToolChoice};
use al_domain::error::{Error, Result};
use al_domain::event::EventPayload;
use al_domain::record::{MessageRecord, MessageType, SandboxInfo};
use al_domain::stream::{StreamEvent, Usage};
use al_providers::{backoff_delay, idle_guard, with_retries, ChatRequest};
use al_tools::{dispatch_batch, LocalSandbox, SandboxHandle, ToolContext};

use crate::state::AppState;

use super::compact;
use super::stop::StopFlag;
use super::xml::{render_results_block, XmlCallScanner};
use super::{build_assistant_tool_message, records_to_messages};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run input / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a worker needs to execute one run.
#[derive(Clone)]
pub struct RunInput {
    pub run_id: Uuid,
    pub thread_id: Uuid,
    pub project_id: Uuid,
    pub account_id: String,
    pub system_prompt: String,
    /// Model spec ("provider/model"); `None` = configured default.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_choice: ToolChoice,
    pub tool_call_style: ToolCallStyle,
    pub include_xml_examples: bool,
    pub enable_thinking: bool,
    pub reasoning_effort: Option<String>,
    /// Tools the agent may use; `None` = all registered.
    pub enabled_tools: Option<BTreeSet<String>>,
    /// When set, tools are disabled and the final text must validate
    /// against this JSON schema.
    pub output_schema: Option<Value>,
}

/// How a run ended, short of failure.
pub enum TurnOutcome {
    Completed { final_text: String, usage: Usage },
    Stopped,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_thread
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Execute one run to completion. Non-terminal events are published
/// here; the caller converts the outcome (or error) into the single
/// terminal status event.
pub async fn run_thread(
    state: &AppState,
    input: &RunInput,
    stop: &StopFlag,
) -> Result<TurnOutcome> {
    // ── Pre-flight ───────────────────────────────────────────────────
    state.billing.check(&input.account_id)?;
    state.billing.record_run(&input.account_id);

    let (provider, model) = state.llm.resolve(input.model.as_deref())?;
    let sandbox = ensure_sandbox(state, input.project_id)?;

    let ctx = ToolContext {
        run_id: input.run_id,
        thread_id: input.thread_id,
        project_id: input.project_id,
        sandbox: Some(sandbox),
        messages: state.store.messages.clone(),
        tasklist_locks: state.tasklist_locks.clone(),
    };

    let xml_style = input.tool_call_style == ToolCallStyle::Xml;
    let schema_mode = input.output_schema.is_some();

    // ── Tool schema injection ────────────────────────────────────────
    let tool_defs = if schema_mode || xml_style || input.tool_choice == ToolChoice::None {
        Vec::new()
    } else {
        state.tools.definitions(input.enabled_tools.as_ref())
    };

    let mut system_prompt = input.system_prompt.clone();
    if xml_style && input.include_xml_examples && !schema_mode {
        let examples = state.tools.xml_examples(input.enabled_tools.as_ref());
        if !examples.is_empty() {
            system_prompt.push_str(
                "\n\n# Tool invocation\n\
                 Invoke tools with blocks of the form:\n\
                 <function_calls>\n<invoke name=\"tool_name\">\n\
                 <parameter name=\"arg\">value</parameter>\n</invoke>\n</function_calls>\n\n",
            );
            system_prompt.push_str(&examples);
        }
    }

    // ── Context assembly (with proactive compression) ────────────────
    let mut compressed_this_run = false;
    if compact::should_compress(&state.store.messages.read(&input.thread_id), &state.config.context)
    {
        compress_history(state, input, &model).await?;
        compressed_this_run = true;
    }
    let mut messages = assemble_messages(state, input, &system_prompt);

    // ── The loop ─────────────────────────────────────────────────────
    let mut total_usage = Usage::default();
    let mut auto_continues = 0u32;
    let max_iterations = state.config.run.max_iterations;
    let idle = Duration::from_secs(state.config.llm.idle_timeout_seconds);
    let max_retries = state.config.llm.max_retries;

    for _llm_call in 0..max_iterations {
        if stop.is_stopped() {
            return Ok(TurnOutcome::Stopped);
        }

        // ── Stream one LLM call, retrying transient failures ─────────
        let mut text_buf = String::new();
        let mut pending_tool_calls: Vec<ToolCall> = Vec::new();
        let mut turn_usage: Option<Usage> = None;
        let mut attempt = 0u32;

        'llm_call: loop {
            // Rebuilt per attempt: compression may have replaced the
            // message list.
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                tool_choice: if schema_mode {
                    ToolChoice::None
                } else {
                    input.tool_choice
                },
                temperature: input
                    .temperature
                    .or(Some(state.config.llm.temperature)),
                max_tokens: input.max_tokens.or(Some(state.config.llm.max_tokens)),
                json_mode: schema_mode,
                enable_thinking: input.enable_thinking,
                reasoning_effort: input.reasoning_effort.clone(),
                model: Some(model.clone()),
            };

            let opened = provider.chat_stream(&req).await;
            let mut stream = match opened {
                Ok(s) => idle_guard(s, idle),
                Err(Error::ContextWindow(_)) if !compressed_this_run => {
                    tracing::info!(run_id = %input.run_id, "context window exceeded; compressing history");
                    compress_history(state, input, &model).await?;
                    compressed_this_run = true;
                    messages = assemble_messages(state, input, &system_prompt);
                    continue 'llm_call;
                }
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                    continue 'llm_call;
                }
                Err(e) if e.is_retryable() => return Err(Error::LlmExhausted(e.to_string())),
                Err(e) => return Err(e),
            };

            // Tool call assembly: call_id -> (name, args_json).
            let mut tc_bufs: std::collections::HashMap<String, (String, String)> =
                std::collections::HashMap::new();
            let mut stream_error: Option<Error> = None;

            while let Some(event) = stream.next().await {
                if stop.is_stopped() {
                    return Ok(TurnOutcome::Stopped);
                }
                match event {
                    Ok(StreamEvent::Token { text }) => {
                        state.bus.publish(
                            input.run_id,
                            EventPayload::AssistantDelta { text: text.clone() },
                        );
                        text_buf.push_str(&text);
                    }
                    Ok(StreamEvent::Thinking { .. }) => {
                        // Reasoning traces are not part of the run's
                        // event model; drop them.
                    }
                    Ok(StreamEvent::ToolCallStarted { call_id, tool_name }) => {
                        tc_bufs.insert(call_id, (tool_name, String::new()));
                    }
                    Ok(StreamEvent::ToolCallDelta { call_id, delta }) => {
                        if let Some((_, args)) = tc_bufs.get_mut(&call_id) {
                            args.push_str(&delta);
                        }
                    }
                    Ok(StreamEvent::ToolCallFinished {
                        call_id,
                        tool_name,
                        arguments,
                    }) => {
                        pending_tool_calls.push(ToolCall {
                            call_id: call_id.clone(),
                            tool_name,
                            arguments,
                        });
                        tc_bufs.remove(&call_id);
                    }
                    Ok(StreamEvent::Done { usage, .. }) => {
                        turn_usage = usage;
                    }
                    Ok(StreamEvent::Error { message }) => {
                        stream_error = Some(Error::Other(message));
                        break;
                    }
                    Err(e) => {
                        stream_error = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = stream_error {
                // Retry only when nothing was consumed yet; a partial
                // answer has already been published to subscribers.
                let clean_slate =
                    text_buf.is_empty() && pending_tool_calls.is_empty() && tc_bufs.is_empty();
                if e.is_retryable() && clean_slate && attempt < max_retries {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                    continue 'llm_call;
                }
                if e.is_retryable() {
                    return Err(Error::LlmExhausted(e.to_string()));
                }
                return Err(e);
            }

            // Some providers finish tool calls via start/delta only.
            for (call_id, (name, args_str)) in tc_bufs.drain() {
                let arguments = if args_str.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&args_str).unwrap_or_else(|e| {
                        tracing::warn!(
                            call_id = %call_id,
                            tool = %name,
                            error = %e,
                            "tool call arguments are not valid JSON; defaulting to empty object"
                        );
                        Value::Object(Default::default())
                    })
                };
                pending_tool_calls.push(ToolCall {
                    call_id,
                    tool_name: name,
                    arguments,
                });
            }
            break 'llm_call;
        }

        // ── XML tool extraction ──────────────────────────────────────
        if xml_style && !schema_mode {
            let mut scanner = XmlCallScanner::new();
            pending_tool_calls.extend(scanner.scan(&text_buf, &state.tools));
        }

        if let Some(u) = &turn_usage {
            total_usage.accumulate(u);
            state
                .billing
                .record_tokens(&input.account_id, u.total_tokens as u64);
        }

        // ── Output-schema mode: validate and finish ──────────────────
        if schema_mode {
            let schema = input.output_schema.as_ref().unwrap();
            validate_output(&text_buf, schema)?;
            persist_assistant_final(state, input, &text_buf)?;
            state.bus.publish(
                input.run_id,
                EventPayload::AssistantFinal {
                    content: text_buf.clone(),
                    tool_calls: None,
                },
            );
            return Ok(TurnOutcome::Completed {
                final_text: text_buf,
                usage: total_usage,
            });
        }

        // ── Final answer: no tool calls ──────────────────────────────
        if pending_tool_calls.is_empty() {
            persist_assistant_final(state, input, &text_buf)?;
            state.bus.publish(
                input.run_id,
                EventPayload::AssistantFinal {
                    content: text_buf.clone(),
                    tool_calls: None,
                },
            );
            return Ok(TurnOutcome::Completed {
                final_text: text_buf,
                usage: total_usage,
            });
        }

        // ── Tool round ───────────────────────────────────────────────
        persist_assistant_tool_turn(state, input, &text_buf, &pending_tool_calls)?;
        messages.push(build_assistant_tool_message(&text_buf, &pending_tool_calls));

        for tc in &pending_tool_calls {
            if stop.is_stopped() {
                return Ok(TurnOutcome::Stopped);
            }
            state.bus.publish(
                input.run_id,
                EventPayload::ToolCall {
                    call_id: tc.call_id.clone(),
                    name: tc.tool_name.clone(),
                    args: tc.arguments.clone(),
                },
            );
        }

        let results = dispatch_batch(
            &state.tools,
            &pending_tool_calls,
            &ctx,
            &state.config.tools,
        )
        .await;

        let mut hit_terminal = false;
        let mut xml_results: Vec<(String, String, bool)> = Vec::new();

        for (tc, result) in pending_tool_calls.iter().zip(&results) {
            state.bus.publish(
                input.run_id,
                EventPayload::ToolResult {
                    call_id: tc.call_id.clone(),
                    success: result.success,
                    output: result.output.clone(),
                    attachments: if result.attachments.is_empty() {
                        None
                    } else {
                        Some(result.attachments.clone())
                    },
                },
            );
            persist_tool_result(state, input, tc, result)?;

            if xml_style {
                xml_results.push((tc.tool_name.clone(), result.output.clone(), result.success));
            } else {
                messages.push(Message::tool_result(&tc.call_id, &result.output));
            }
            if result.is_terminal() {
                hit_terminal = true;
            }
        }

        if xml_style {
            messages.push(Message::user(render_results_block(&xml_results)));
        }

        if hit_terminal {
            state.bus.publish(
                input.run_id,
                EventPayload::AssistantFinal {
                    content: text_buf.clone(),
                    tool_calls: Some(pending_tool_calls.clone()),
                },
            );
            return Ok(TurnOutcome::Completed {
                final_text: text_buf,
                usage: total_usage,
            });
        }

        // Native auto-continue budget.
        if !xml_style {
            auto_continues += 1;
            if auto_continues > state.config.run.native_max_auto_continues {
                state.bus.publish(
                    input.run_id,
                    EventPayload::Error {
                        message: format!(
                            "auto-continue limit reached ({} continuations)",
                            state.config.run.native_max_auto_continues
                        ),
                        recoverable: false,
                    },
                );
                return Ok(TurnOutcome::Completed {
                    final_text: text_buf,
                    usage: total_usage,
                });
            }
        }
    }

    state.bus.publish(
        input.run_id,
        EventPayload::Error {
            message: format!("iteration limit reached ({max_iterations} LLM calls)"),
            recoverable: false,
        },
    );
    Ok(TurnOutcome::Completed {
        final_text: String::new(),
        usage: total_usage,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the project's sandbox, binding metadata on first use.
fn ensure_sandbox(state: &AppState, project_id: Uuid) -> Result<Arc<dyn SandboxHandle>> {
    let dir = state
        .config
        .sandbox
        .workspace_root
        .join(project_id.to_string());
    let sandbox = LocalSandbox::new(dir, state.config.sandbox.max_output_chars)?;

    if let Some(project) = state.store.projects.get(&project_id) {
        if project.sandbox.is_none() {
            let info = SandboxInfo {
                id: format!("local-{project_id}"),
                pass: Uuid::new_v4().to_string(),
                vnc_preview: None,
                sandbox_url: None,
            };
            if let Err(e) = state.store.projects.set_sandbox(&project_id, info) {
                tracing::warn!(project_id = %project_id, error = %e, "failed to bind sandbox metadata");
            }
        }
    }

    Ok(Arc::new(sandbox))
}

/// Build the LLM message list: system prompt + history after the
/// newest summary.
fn assemble_messages(state: &AppState, input: &RunInput, system_prompt: &str) -> Vec<Message> {
    let records = state.store.messages.read(&input.thread_id);
    let boundary = compact::history_boundary(&records);
    let mut messages = vec![Message::system(system_prompt)];
    messages.extend(records_to_messages(&records[boundary..]));
    messages
}

/// Compress the oldest block of history into a summary message.
async fn compress_history(state: &AppState, input: &RunInput, model: &str) -> Result<()> {
    let records = state.store.messages.read(&input.thread_id);
    let (start, end) = compact::select_block(&records, &state.config.context);
    if start >= end {
        return Err(Error::ContextWindow(
            "history cannot be compressed further".into(),
        ));
    }

    // Summarizer role falls back to the executing provider.
    let (summarizer, summarizer_model) = match &state.config.llm.summarizer_model {
        Some(spec) => state.llm.resolve(Some(spec))?,
        None => (
            state.llm.resolve(input.model.as_deref())?.0,
            model.to_string(),
        ),
    };
    let block = &records[start..end];
    let turns = block
        .iter()
        .filter(|r| r.kind == MessageType::User)
        .count();
    let summary = with_retries(state.config.llm.max_retries, || {
        compact::generate_summary(summarizer.as_ref(), &summarizer_model, block)
    })
    .await?;

    let mut record = compact::summary_record(input.thread_id, input.project_id, &summary, turns);
    // Position the summary between the compressed block and the
    // preserved tail, so context assembly keeps the tail.
    let after_block = records[end - 1].created_at + chrono::Duration::milliseconds(1);
    record.created_at = match records.get(end) {
        Some(next) if after_block >= next.created_at => records[end - 1].created_at,
        _ => after_block,
    };
    state.store.messages.append(&record)?;

    tracing::info!(
        thread_id = %input.thread_id,
        turns_compacted = turns,
        summary_len = summary.len(),
        "history compressed"
    );
    Ok(())
}

/// Final assistant text must parse as JSON and carry the schema's
/// required properties.
fn validate_output(text: &str, schema: &Value) -> Result<()> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| Error::Other(format!("output is not valid JSON: {e}")))?;
    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required {
            if let Some(name) = key.as_str() {
                if value.get(name).is_none() {
                    return Err(Error::Other(format!(
                        "output is missing required property '{name}'"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn persist_assistant_final(state: &AppState, input: &RunInput, text: &str) -> Result<()> {
    let record = MessageRecord::new(
        input.thread_id,
        input.project_id,
        MessageType::Assistant,
        "assistant",
        serde_json::json!(text),
    )
    .with_run_id(input.run_id);
    state.store.messages.append(&record)
}

fn persist_assistant_tool_turn(
    state: &AppState,
    input: &RunInput,
    text: &str,
    tool_calls: &[ToolCall],
) -> Result<()> {
    let record = MessageRecord::new(
        input.thread_id,
        input.project_id,
        MessageType::Assistant,
        "assistant",
        serde_json::json!({"text": text, "tool_calls": tool_calls}),
    )
    .with_run_id(input.run_id);
    state.store.messages.append(&record)
}

fn persist_tool_result(
    state: &AppState,
    input: &RunInput,
    call: &ToolCall,
    result: &al_tools::ToolResult,
) -> Result<()> {
    let mut record = MessageRecord::new(
        input.thread_id,
        input.project_id,
        MessageType::Tool,
        "tool",
        serde_json::json!(result.output),
    )
    .with_run_id(input.run_id);
    record.metadata = serde_json::json!({
        "thread_run_id": input.run_id,
        "call_id": call.call_id,
        "tool_name": call.tool_name,
        "success": result.success,
    });
    state.store.messages.append(&record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_validation_checks_required_keys() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["answer", "confidence"]
        });
        assert!(validate_output(r#"{"answer": "42", "confidence": 0.9}"#, &schema).is_ok());
        assert!(validate_output(r#"{"answer": "42"}"#, &schema).is_err());
        assert!(validate_output("not json", &schema).is_err());
    }
}
