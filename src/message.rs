//! Message record
//!
//! A `Message` is what the durable log stores and what subscribers receive.
//! It is immutable once the log hands it back from `append`.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sequence number assigned by the log (starts at 1)
    pub id: u64,
    /// Author label of the submitting connection
    pub author: String,
    /// Server time at submission, whole seconds
    pub time: DateTime<Utc>,
    /// Message body
    pub text: String,
}

impl Message {
    /// Create a message record
    pub fn new(id: u64, author: impl Into<String>, time: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            id,
            author: author.into(),
            time: time.trunc_subsecs(0),
            text: text.into(),
        }
    }

    /// RFC 3339 rendering used on the wire (`2024-05-01T12:00:00Z`)
    pub fn time_string(&self) -> String {
        format_time(&self.time)
    }
}

/// Current time at the precision the log stores
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Format a timestamp the way it travels on the wire
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a wire timestamp
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}\n{}", self.author, self.time_string(), self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_string_is_sortable_rfc3339() {
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();

        let a = Message::new(1, "ann", early, "hi");
        let b = Message::new(2, "bob", late, "yo");

        assert_eq!(a.time_string(), "2024-05-01T09:00:00Z");
        assert!(a.time_string() < b.time_string());
        assert_eq!(parse_time(&b.time_string()), Some(late));
    }

    #[test]
    fn test_subsecond_precision_dropped() {
        let t = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        let msg = Message::new(1, "ann", t, "hi");
        assert_eq!(msg.time.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_display() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let msg = Message::new(7, "ann", t, "hello");
        assert_eq!(msg.to_string(), "ann 2024-01-02T03:04:05Z\nhello");
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert_eq!(parse_time("yesterday"), None);
    }
}
