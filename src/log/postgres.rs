//! PostgreSQL log (feature `postgres`)
//!
//! The table name is validated once when the log is opened and quoted as an
//! identifier; every statement is built at that point and all values travel
//! as bind parameters.
//!
//! An existing table is used as found. Older tables with `id SERIAL` and a
//! plain `TIMESTAMP` column work because every statement casts to `int8` and
//! `timestamptz`; a row that still does not decode is an error, never a panic.

use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};

use super::{MessageLog, ScanOrder};
use crate::error::LogError;
use crate::message::Message;

/// Result columns, cast to the types `row_to_message` decodes
const COLUMNS: &str = "id::int8, username::text, time::timestamptz, message::text";

struct Statements {
    insert: String,
    select_all: String,
    select_recent: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            insert: format!(
                "INSERT INTO \"{table}\" (username, time, message) \
                 VALUES ($1, $2::timestamptz, $3) RETURNING {COLUMNS}"
            ),
            select_all: format!("SELECT {COLUMNS} FROM \"{table}\" ORDER BY id"),
            select_recent: format!(
                "SELECT {COLUMNS} FROM \"{table}\" ORDER BY id DESC LIMIT $1"
            ),
        }
    }
}

/// Log stored in a PostgreSQL table
pub struct PgLog {
    client: Client,
    statements: Statements,
}

impl PgLog {
    /// Connect, create the table and its time index if missing
    pub async fn connect(url: &str, table: &str) -> Result<Self, LogError> {
        validate_table_name(table)?;

        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Postgres connection error");
            }
        });

        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (\
                     id       BIGSERIAL   PRIMARY KEY, \
                     username TEXT        NOT NULL, \
                     time     TIMESTAMPTZ NOT NULL, \
                     message  TEXT        NOT NULL\
                 ); \
                 CREATE INDEX IF NOT EXISTS \"{table}_time_index\" ON \"{table}\" (time);"
            ))
            .await?;

        tracing::info!(table = table, "Postgres message log ready");

        Ok(Self {
            client,
            statements: Statements::for_table(table),
        })
    }
}

/// Accept only plain identifiers so quoting can never be escaped
pub fn validate_table_name(table: &str) -> Result<(), LogError> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    // 63 is the identifier limit; leave room for the "_time_index" suffix.
    if valid_start && valid_rest && table.len() <= 52 {
        Ok(())
    } else {
        Err(LogError::InvalidTable(table.to_string()))
    }
}

fn row_to_message(row: &Row) -> Result<Message, LogError> {
    let id: i64 = row.try_get(0)?;
    Ok(Message::new(
        id.max(0) as u64,
        row.try_get::<_, String>(1)?,
        row.try_get::<_, DateTime<Utc>>(2)?,
        row.try_get::<_, String>(3)?,
    ))
}

impl MessageLog for PgLog {
    async fn append(
        &self,
        author: &str,
        time: DateTime<Utc>,
        text: &str,
    ) -> Result<Message, LogError> {
        let row = self
            .client
            .query_one(&self.statements.insert, &[&author, &time, &text])
            .await?;
        row_to_message(&row)
    }

    async fn scan(&self, limit: u64, order: ScanOrder) -> Result<Vec<Message>, LogError> {
        let mut messages: Vec<Message> = if limit == 0 {
            self.client
                .query(&self.statements.select_all, &[])
                .await?
                .iter()
                .map(row_to_message)
                .collect::<Result<_, _>>()?
        } else {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let mut recent: Vec<Message> = self
                .client
                .query(&self.statements.select_recent, &[&limit])
                .await?
                .iter()
                .map(row_to_message)
                .collect::<Result<_, _>>()?;
            recent.reverse();
            recent
        };

        if order == ScanOrder::NewestFirst {
            messages.reverse();
        }
        Ok(messages)
    }
}
