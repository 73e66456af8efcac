//! Append-only file log
//!
//! One JSON object per line. Every append is flushed with `sync_data` before
//! the record is handed back, so a message a subscriber sees is on disk.
//!
//! On open the whole file is read into memory to recover the id sequence and
//! serve scans, and every later append is kept there too: memory use grows
//! with the whole log for the life of the process. Use the Postgres log for
//! histories that should not live in RAM.
//!
//! A final line without its trailing newline is the remains of an append
//! interrupted by a crash. Its `sync_data` never returned, so the record was
//! never acknowledged or broadcast; it is cut off even if it parses. Any other
//! bad line is reported as corruption. Within a running process, an append
//! that failed or was dropped half way is cut back by the next append.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{select_range, MessageLog, ScanOrder};
use crate::error::LogError;
use crate::message::Message;

struct Inner {
    file: File,
    records: Vec<Message>,
    /// Length of the file up to the last complete record
    len: u64,
    /// An append started but did not finish (its future was dropped)
    dirty: bool,
}

/// Log stored as JSON lines in a single file
pub struct FileLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileLog {
    /// Open (or create) the log at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let (records, valid_len) = parse_records(&contents)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        if valid_len < contents.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = contents.len() - valid_len,
                "Truncating torn record at end of log"
            );
            file.set_len(valid_len as u64).await?;
        }

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "Message log opened"
        );

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                records,
                len: valid_len as u64,
                dirty: false,
            }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

/// Parse file contents, returning the records and the byte length that holds them
fn parse_records(contents: &[u8]) -> Result<(Vec<Message>, usize), LogError> {
    let mut records = Vec::new();
    let mut offset = 0;
    let mut line_no = 0;

    while offset < contents.len() {
        line_no += 1;
        let rest = &contents[offset..];
        let (line, consumed, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => (&rest[..pos], pos + 1, true),
            None => (rest, rest.len(), false),
        };

        if line.iter().all(u8::is_ascii_whitespace) {
            offset += consumed;
            continue;
        }

        if !terminated {
            return Ok((records, offset));
        }

        match serde_json::from_slice::<Message>(line) {
            Ok(msg) => records.push(msg),
            Err(source) => {
                return Err(LogError::Corrupt {
                    line: line_no,
                    source,
                })
            }
        }
        offset += consumed;
    }

    Ok((records, offset))
}

impl MessageLog for FileLog {
    async fn append(
        &self,
        author: &str,
        time: DateTime<Utc>,
        text: &str,
    ) -> Result<Message, LogError> {
        let mut inner = self.inner.lock().await;
        let id = inner.records.last().map_or(1, |m| m.id + 1);
        let msg = Message::new(id, author, time, text);

        let mut line = serde_json::to_vec(&msg).map_err(LogError::Serialize)?;
        line.push(b'\n');

        if inner.dirty {
            let len = inner.len;
            inner.file.set_len(len).await?;
            inner.dirty = false;
        }

        inner.dirty = true;
        inner.file.write_all(&line).await?;
        inner.file.sync_data().await?;
        inner.dirty = false;
        inner.len += line.len() as u64;
        inner.records.push(msg.clone());

        Ok(msg)
    }

    async fn scan(&self, limit: u64, order: ScanOrder) -> Result<Vec<Message>, LogError> {
        let inner = self.inner.lock().await;
        Ok(select_range(&inner.records, limit, order))
    }
}
