//! Write path
//!
//! Every inbound text is persisted first and broadcast second, so a
//! subscriber can never observe a message the log does not have.

use std::sync::Arc;

use crate::error::Result;
use crate::log::MessageLog;
use crate::message::now;
use crate::registry::SubscriberRegistry;

use super::channel::TextSource;

/// Persist and broadcast every text from `source` under `author`
///
/// Returns the number of messages written once the source reports end of
/// input. A log failure aborts the stream; messages already written stay
/// written. Subscribers that cannot keep up are evicted by the broadcast and
/// the writer never hears about it.
pub async fn submit<L, S>(
    log: &L,
    registry: &SubscriberRegistry,
    author: &str,
    source: &mut S,
) -> Result<u64>
where
    L: MessageLog,
    S: TextSource,
{
    let mut count = 0u64;

    while let Some(text) = source.next_text().await? {
        let msg = log.append(author, now(), &text).await?;
        let message_id = msg.id;
        let report = registry.broadcast(Arc::new(msg));

        tracing::debug!(
            author = author,
            message_id = message_id,
            delivered = report.delivered,
            evicted = report.evicted,
            "Message written"
        );

        count += 1;
    }

    Ok(count)
}
