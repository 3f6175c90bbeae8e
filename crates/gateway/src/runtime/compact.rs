//! History compression — collapses old conversation history into a
//! summary message so the context window stays healthy after many
//! turns.
//!
//! Compression appends a `summary` message (never rewrites history).
//! Context assembly uses only records after the newest summary, with
//! the summary itself as the leading system message. The compressed
//! block never includes the last `tail_preserve_turns` user turns and
//! never crosses a `task_list` message.

use al_domain::config::ContextConfig;
use al_domain::error::Result;
use al_domain::record::{MessageRecord, MessageType};
use al_providers::{ChatRequest, LlmProvider};

use al_domain::chat::Message;

/// chars/4 — the classic rough token estimate.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

pub fn estimate_records(records: &[MessageRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.is_llm_message)
        .map(|r| estimate_tokens(&r.content_text()))
        .sum()
}

/// Index of the newest summary record, if any. Context assembly starts
/// there: the summary becomes the first history message.
pub fn history_boundary(records: &[MessageRecord]) -> usize {
    for i in (0..records.len()).rev() {
        if records[i].kind == MessageType::Summary {
            return i;
        }
    }
    0
}

/// Whether the active history (after the last summary) is over the
/// soft ceiling.
pub fn should_compress(records: &[MessageRecord], config: &ContextConfig) -> bool {
    let boundary = history_boundary(records);
    estimate_records(&records[boundary..]) > config.soft_ceiling_tokens
}

/// Pick the block of records to compress: everything after the last
/// summary, up to (a) the tail-preserve boundary and (b) the first
/// `task_list` message, whichever comes first. Returns `(start, end)`
/// indices into `records`; an empty range means nothing compressible.
pub fn select_block(records: &[MessageRecord], config: &ContextConfig) -> (usize, usize) {
    let boundary = history_boundary(records);
    let start = if records
        .get(boundary)
        .map(|r| r.kind == MessageType::Summary)
        .unwrap_or(false)
    {
        boundary + 1
    } else {
        boundary
    };

    // Walk back over the last N user turns; they are never rewritten.
    let mut user_count = 0;
    let mut end = start;
    for (i, record) in records.iter().enumerate().skip(start).rev() {
        if record.kind == MessageType::User {
            user_count += 1;
            if user_count >= config.tail_preserve_turns {
                end = i;
                break;
            }
        }
    }

    // Never cross a task_list snapshot.
    for (i, record) in records.iter().enumerate().take(end).skip(start) {
        if record.kind == MessageType::TaskList {
            end = i;
            break;
        }
    }

    (start, end)
}

/// Summarize a block of records with a nested non-streaming LLM call.
pub async fn generate_summary(
    provider: &dyn LlmProvider,
    model: &str,
    block: &[MessageRecord],
) -> Result<String> {
    let conversation = build_conversation_text(block);

    let prompt = format!(
        "You are a conversation summarizer. Summarize the following conversation \
         history into a concise summary that preserves:\n\
         1. The current goal or plan being worked on\n\
         2. Key decisions made\n\
         3. Open questions or threads\n\
         4. Important facts learned about the user or context\n\
         5. Tool state (files written, running processes, pending work)\n\n\
         Be concise but preserve all actionable context. Write in present tense.\n\
         Omit greetings and pleasantries. Focus on substance.\n\n\
         CONVERSATION:\n{conversation}"
    );

    let req = ChatRequest {
        messages: vec![Message::user(prompt)],
        temperature: Some(0.1),
        max_tokens: Some(2000),
        model: Some(model.to_string()),
        ..Default::default()
    };

    let resp = provider.chat(&req).await?;
    Ok(resp.content)
}

/// The summary message appended to the thread after compression.
pub fn summary_record(
    thread_id: uuid::Uuid,
    project_id: uuid::Uuid,
    summary: &str,
    turns_compacted: usize,
) -> MessageRecord {
    let mut record = MessageRecord::new(
        thread_id,
        project_id,
        MessageType::Summary,
        "system",
        serde_json::json!(summary),
    );
    record.metadata = serde_json::json!({
        "compaction": true,
        "turns_compacted": turns_compacted,
    });
    record
}

fn build_conversation_text(records: &[MessageRecord]) -> String {
    let mut buf = String::new();
    for record in records {
        if !record.is_llm_message {
            continue;
        }
        let role_label = match record.kind {
            MessageType::User => "User",
            MessageType::Assistant => "Assistant",
            MessageType::Tool => "Tool",
            MessageType::Summary => "Summary",
            _ => continue,
        };
        buf.push_str(role_label);
        buf.push_str(": ");
        let content = record.content_text();
        // Truncate very long entries (tool results) to keep the summary
        // prompt manageable.
        if content.len() > 2000 {
            let head_end = floor_char_boundary(&content, 1000);
            let tail_start = ceil_char_boundary(&content, content.len() - 500);
            buf.push_str(&content[..head_end]);
            buf.push_str(" [...] ");
            buf.push_str(&content[tail_start..]);
        } else {
            buf.push_str(&content);
        }
        buf.push('\n');
    }
    buf
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(kind: MessageType, text: &str) -> MessageRecord {
        let id = Uuid::new_v4();
        let mut r = MessageRecord::new(id, id, kind, "user", serde_json::json!(text));
        // Deterministic ordering for tests.
        r.created_at = chrono::Utc::now();
        r
    }

    fn turns(n: usize) -> Vec<MessageRecord> {
        let mut records = Vec::new();
        for i in 0..n {
            records.push(record(MessageType::User, &format!("question {i}")));
            records.push(record(MessageType::Assistant, &format!("answer {i}")));
        }
        records
    }

    #[test]
    fn estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn boundary_finds_newest_summary() {
        let mut records = turns(2);
        assert_eq!(history_boundary(&records), 0);
        records.push(record(MessageType::Summary, "so far"));
        records.push(record(MessageType::User, "next"));
        assert_eq!(history_boundary(&records), 4);
    }

    #[test]
    fn should_compress_respects_ceiling() {
        let config = ContextConfig {
            soft_ceiling_tokens: 10,
            tail_preserve_turns: 1,
        };
        let records = turns(10);
        assert!(should_compress(&records, &config));

        let config_big = ContextConfig {
            soft_ceiling_tokens: 1_000_000,
            tail_preserve_turns: 1,
        };
        assert!(!should_compress(&records, &config_big));
    }

    #[test]
    fn select_block_preserves_tail_turns() {
        let config = ContextConfig {
            soft_ceiling_tokens: 10,
            tail_preserve_turns: 2,
        };
        let records = turns(5);
        let (start, end) = select_block(&records, &config);
        assert_eq!(start, 0);
        // Last two user turns (indices 6 and 8) stay; block ends at 6.
        assert_eq!(end, 6);
    }

    #[test]
    fn select_block_stops_at_task_list() {
        let config = ContextConfig {
            soft_ceiling_tokens: 10,
            tail_preserve_turns: 1,
        };
        let mut records = turns(2);
        records.push(record(MessageType::TaskList, "{\"sections\":[]}"));
        records.extend(turns(3));
        let (start, end) = select_block(&records, &config);
        assert_eq!(start, 0);
        // The block must not cross the task_list at index 4.
        assert!(end <= 4, "end={end}");
    }

    #[test]
    fn select_block_after_prior_summary() {
        let config = ContextConfig {
            soft_ceiling_tokens: 10,
            tail_preserve_turns: 1,
        };
        let mut records = turns(1);
        records.push(record(MessageType::Summary, "old summary"));
        records.extend(turns(4));
        let (start, end) = select_block(&records, &config);
        // Starts right after the summary marker at index 2.
        assert_eq!(start, 3);
        assert!(end > start);
    }

    #[test]
    fn conversation_text_skips_non_llm_rows() {
        let mut status = record(MessageType::Status, "running");
        status.is_llm_message = false;
        let records = vec![
            record(MessageType::User, "hello"),
            status,
            record(MessageType::Assistant, "hi"),
        ];
        let text = build_conversation_text(&records);
        assert!(text.contains("User: hello"));
        assert!(text.contains("Assistant: hi"));
        assert!(!text.contains("running"));
    }
}
