//! In-memory log
//!
//! Nothing survives a restart. Used by tests and by the demo server when no
//! log file is given.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{select_range, MessageLog, ScanOrder};
use crate::error::LogError;
use crate::message::Message;

/// Log backed by a `Vec`
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<Message>>,
}

impl MemoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl MessageLog for MemoryLog {
    async fn append(
        &self,
        author: &str,
        time: DateTime<Utc>,
        text: &str,
    ) -> Result<Message, LogError> {
        let mut records = self.records.lock();
        let id = records.last().map_or(1, |m| m.id + 1);
        let msg = Message::new(id, author, time, text);
        records.push(msg.clone());
        Ok(msg)
    }

    async fn scan(&self, limit: u64, order: ScanOrder) -> Result<Vec<Message>, LogError> {
        Ok(select_range(&self.records.lock(), limit, order))
    }
}
