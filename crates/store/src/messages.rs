//! Per-thread append-only message logs.
//!
//! Each thread gets a `messages/<thread_id>.jsonl` file. Rows are
//! appended in arrival order and read back sorted by
//! `(created_at, message_id)`, the thread's total order.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use al_domain::error::Result;
use al_domain::record::{MessageRecord, MessageType};

use crate::{append_jsonl, read_jsonl};

pub struct MessageLog {
    base_dir: PathBuf,
}

impl MessageLog {
    pub fn open(state_path: &Path) -> Result<Self> {
        let base_dir = state_path.join("messages");
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, thread_id: &Uuid) -> PathBuf {
        self.base_dir.join(format!("{thread_id}.jsonl"))
    }

    pub fn append(&self, record: &MessageRecord) -> Result<()> {
        append_jsonl(&self.path_for(&record.thread_id), record)
    }

    /// All messages of a thread in ascending order.
    pub fn read(&self, thread_id: &Uuid) -> Vec<MessageRecord> {
        let mut rows: Vec<MessageRecord> = read_jsonl(&self.path_for(thread_id));
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.message_id.cmp(&b.message_id))
        });
        rows
    }

    /// A descending page ending before `before` (exclusive), re-sorted
    /// ascending for the response.
    pub fn page(
        &self,
        thread_id: &Uuid,
        limit: usize,
        before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Vec<MessageRecord> {
        let rows = self.read(thread_id);
        let mut page: Vec<MessageRecord> = rows
            .into_iter()
            .rev()
            .filter(|m| before.map_or(true, |b| m.created_at < b))
            .take(limit)
            .collect();
        page.reverse();
        page
    }

    /// Newest message of the given kind, if any.
    pub fn latest_of_kind(&self, thread_id: &Uuid, kind: MessageType) -> Option<MessageRecord> {
        self.read(thread_id)
            .into_iter()
            .rev()
            .find(|m| m.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(thread: Uuid, kind: MessageType, text: &str) -> MessageRecord {
        MessageRecord::new(thread, thread, kind, "user", serde_json::json!(text))
    }

    #[test]
    fn append_and_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::open(dir.path()).unwrap();
        let thread = Uuid::new_v4();

        for i in 0..5 {
            log.append(&msg(thread, MessageType::User, &format!("m{i}")))
                .unwrap();
        }

        let rows = log.read(&thread);
        assert_eq!(rows.len(), 5);
        let texts: Vec<String> = rows.iter().map(|m| m.content_text()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn page_respects_limit_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::open(dir.path()).unwrap();
        let thread = Uuid::new_v4();

        for i in 0..10 {
            let mut m = msg(thread, MessageType::User, &format!("m{i}"));
            m.created_at = chrono::Utc::now() + chrono::Duration::milliseconds(i);
            log.append(&m).unwrap();
        }

        let page = log.page(&thread, 3, None);
        assert_eq!(page.len(), 3);
        // Latest three, ascending.
        let texts: Vec<String> = page.iter().map(|m| m.content_text()).collect();
        assert_eq!(texts, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn latest_of_kind_finds_newest_task_list() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::open(dir.path()).unwrap();
        let thread = Uuid::new_v4();

        let mut first = msg(thread, MessageType::TaskList, "old");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        log.append(&first).unwrap();
        log.append(&msg(thread, MessageType::User, "hello")).unwrap();
        log.append(&msg(thread, MessageType::TaskList, "new")).unwrap();

        let latest = log.latest_of_kind(&thread, MessageType::TaskList).unwrap();
        assert_eq!(latest.content_text(), "new");
    }

    #[test]
    fn empty_thread_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::open(dir.path()).unwrap();
        assert!(log.read(&Uuid::new_v4()).is_empty());
        assert!(log
            .latest_of_kind(&Uuid::new_v4(), MessageType::TaskList)
            .is_none());
    }
}
