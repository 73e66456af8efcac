//! Error types
//!
//! Transport, protocol and persistence failures are kept apart so a
//! connection handler can decide what is fatal to the call and what only
//! costs one subscriber its slot.

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket-level failure (reset, unexpected EOF, ...)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Peer sent something we cannot interpret
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Durable log failed to append or scan
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// The other end of a channel is gone
    #[error("channel closed")]
    Closed,

    /// Server answered with an error frame
    #[error("remote error: {0}")]
    Remote(String),

    /// Invalid configuration value
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Wire protocol violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("truncated {0} frame")]
    Truncated(&'static str),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("message of {len} bytes exceeds limit of {limit}")]
    MessageTooLong { len: usize, limit: usize },

    #[error("connection closed before end of stream")]
    PrematureEof,
}

/// Durable log failures
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log I/O: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid table name {0:?}")]
    InvalidTable(String),

    #[cfg(feature = "postgres")]
    #[error("postgres: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

impl Error {
    /// Whether the error means the peer simply went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Closed => true,
            Error::Protocol(ProtocolError::PrematureEof) => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Bad configuration value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    /// Setting name (environment variable)
    pub key: &'static str,
    /// Offending value
    pub value: String,
}
