//! Durable message log
//!
//! The log is the collaborator the relay persists into before anything is
//! broadcast. Two operations are needed: append one record, and read an
//! ordered slice back.
//!
//! # Ordering
//!
//! `scan(0, ..)` returns every record. `scan(n, ..)` with `n > 0` returns the
//! `n` most recent records. In both cases the records come back in the
//! requested [`ScanOrder`]. The subscribe path asks for
//! [`ScanOrder::OldestFirst`] when replaying everything and
//! [`ScanOrder::NewestFirst`] when replaying a limited tail, so a client that
//! asks for "the last 3" sees the newest message first.

pub mod file;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::LogError;
use crate::message::Message;

pub use file::FileLog;
pub use memory::MemoryLog;
#[cfg(feature = "postgres")]
pub use postgres::PgLog;

/// Order in which scanned records are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Ascending by sequence id
    OldestFirst,
    /// Descending by sequence id
    NewestFirst,
}

impl ScanOrder {
    /// The order the subscribe path uses for a requested amount
    ///
    /// `0` (everything) replays oldest-first, any other amount replays
    /// newest-first.
    pub fn for_amount(amount: u64) -> Self {
        if amount == 0 {
            ScanOrder::OldestFirst
        } else {
            ScanOrder::NewestFirst
        }
    }
}

/// Append-only store of every message ever written
pub trait MessageLog: Send + Sync + 'static {
    /// Persist a record and return it with its assigned id
    fn append(
        &self,
        author: &str,
        time: DateTime<Utc>,
        text: &str,
    ) -> impl Future<Output = Result<Message, LogError>> + Send;

    /// Read `limit` most recent records (`0` = all) in `order`
    fn scan(
        &self,
        limit: u64,
        order: ScanOrder,
    ) -> impl Future<Output = Result<Vec<Message>, LogError>> + Send;
}

impl<L: MessageLog> MessageLog for Arc<L> {
    fn append(
        &self,
        author: &str,
        time: DateTime<Utc>,
        text: &str,
    ) -> impl Future<Output = Result<Message, LogError>> + Send {
        (**self).append(author, time, text)
    }

    fn scan(
        &self,
        limit: u64,
        order: ScanOrder,
    ) -> impl Future<Output = Result<Vec<Message>, LogError>> + Send {
        (**self).scan(limit, order)
    }
}

/// Slice an oldest-first record list the way `scan` promises
pub(crate) fn select_range(records: &[Message], limit: u64, order: ScanOrder) -> Vec<Message> {
    let start = match usize::try_from(limit) {
        Ok(0) => 0,
        Ok(n) => records.len().saturating_sub(n),
        Err(_) => 0,
    };
    let tail = &records[start..];

    match order {
        ScanOrder::OldestFirst => tail.to_vec(),
        ScanOrder::NewestFirst => tail.iter().rev().cloned().collect(),
    }
}
