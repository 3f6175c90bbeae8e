//! Core runtime — the orchestrator that ties threads, context
//! assembly, LLM streaming, tool dispatch, and persistence into one
//! deterministic loop.
//!
//! [`turn::run_thread`] executes one run; [`controller`] owns run
//! lifecycle (start/stop/heartbeat/reaper) around it.

pub mod billing;
pub mod compact;
pub mod controller;
pub mod stop;
pub mod turn;
pub mod xml;

pub use turn::{run_thread, RunInput, TurnOutcome};

use al_domain::chat::{ContentPart, Message, MessageContent, Role, ToolCall};
use al_domain::record::{MessageRecord, MessageType};

/// Convert stored records (after the compression boundary) to LLM
/// messages. Summary records become system messages; rows flagged
/// non-LLM are skipped.
pub(crate) fn records_to_messages(records: &[MessageRecord]) -> Vec<Message> {
    let mut messages = Vec::new();

    for record in records {
        if !record.is_llm_message {
            continue;
        }
        match record.kind {
            MessageType::User => messages.push(Message::user(record.content_text())),
            MessageType::Summary => messages.push(Message::system(record.content_text())),
            MessageType::Assistant => messages.push(assistant_record_to_message(record)),
            MessageType::Tool => {
                let Some(call_id) = record.metadata.get("call_id").and_then(|v| v.as_str())
                else {
                    continue;
                };
                messages.push(Message::tool_result(call_id, record.content_text()));
            }
            _ => {}
        }
    }

    messages
}

/// Assistant rows persist either a plain string or
/// `{"text": ..., "tool_calls": [...]}` for tool-call turns.
fn assistant_record_to_message(record: &MessageRecord) -> Message {
    if let Some(obj) = record.content.as_object() {
        let text = obj.get("text").and_then(|v| v.as_str()).unwrap_or("");
        let tool_calls: Vec<ToolCall> = obj
            .get("tool_calls")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        if !tool_calls.is_empty() {
            return build_assistant_tool_message(text, &tool_calls);
        }
    }
    Message::assistant(record.content_text())
}

pub(crate) fn build_assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::new();

    if !text.is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }

    for tc in tool_calls {
        parts.push(ContentPart::ToolUse {
            id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            input: tc.arguments.clone(),
        });
    }

    Message {
        role: Role::Assistant,
        content: MessageContent::Parts(parts),
    }
}

pub(crate) fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn truncate_str_handles_boundaries() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello...");
        // 'é' is two bytes; truncating inside it backs up.
        assert_eq!(truncate_str("h\u{00e9}llo", 2), "h...");
    }

    #[test]
    fn records_map_by_kind() {
        let t = Uuid::new_v4();
        let records = vec![
            MessageRecord::new(t, t, MessageType::User, "user", serde_json::json!("q")),
            MessageRecord::new(
                t,
                t,
                MessageType::Assistant,
                "assistant",
                serde_json::json!("a"),
            ),
            {
                let mut r = MessageRecord::new(
                    t,
                    t,
                    MessageType::Tool,
                    "tool",
                    serde_json::json!("result"),
                );
                r.metadata = serde_json::json!({"call_id": "tc_1"});
                r
            },
            MessageRecord::new(
                t,
                t,
                MessageType::Summary,
                "system",
                serde_json::json!("summary"),
            ),
        ];
        let messages = records_to_messages(&records);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].role, Role::Tool);
        assert_eq!(messages[3].role, Role::System);
    }

    #[test]
    fn tool_record_without_call_id_is_skipped() {
        let t = Uuid::new_v4();
        let records = vec![MessageRecord::new(
            t,
            t,
            MessageType::Tool,
            "tool",
            serde_json::json!("orphan"),
        )];
        assert!(records_to_messages(&records).is_empty());
    }

    #[test]
    fn assistant_tool_turn_round_trips() {
        let t = Uuid::new_v4();
        let calls = vec![ToolCall {
            call_id: "tc_9".into(),
            tool_name: "execute_command".into(),
            arguments: serde_json::json!({"command": "ls"}),
        }];
        let record = MessageRecord::new(
            t,
            t,
            MessageType::Assistant,
            "assistant",
            serde_json::json!({"text": "running", "tool_calls": calls}),
        );
        let msg = assistant_record_to_message(&record);
        match &msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[1], ContentPart::ToolUse { id, .. } if id == "tc_9"));
            }
            _ => panic!("expected Parts content"),
        }
    }
}
