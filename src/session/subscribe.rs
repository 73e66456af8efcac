//! Read path
//!
//! A subscriber first gets the requested slice of history, then the live
//! tail until it goes away.
//!
//! Between the history scan and registration there is a short window: a
//! message written in it may be replayed and also delivered live (twice), or
//! neither (zero times). This is accepted; clients can dedupe on
//! [`Message::id`](crate::message::Message::id).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::log::{MessageLog, ScanOrder};
use crate::registry::SubscriberRegistry;

use super::channel::MessageSink;

/// Why the live tail stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The connection's cancellation token fired (peer left or server shutdown)
    Cancelled,
    /// The registry dropped this subscriber (slow consumer or shutdown)
    Closed,
    /// Sending a live message to the peer failed
    PeerGone,
}

/// Summary of a finished subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOutcome {
    /// Historical records sent
    pub replayed: usize,
    /// Live messages sent
    pub forwarded: u64,
    /// Why it ended
    pub reason: StopReason,
}

/// Replay history, then forward live messages until cancelled
///
/// `amount == 0` replays every record oldest-first; `amount > 0` replays the
/// `amount` most recent records newest-first. A log failure aborts before
/// anything is registered. A failure sending one historical record is logged
/// and skipped.
///
/// The registry slot is released on every exit path, including when the
/// future is dropped mid-wait.
pub async fn subscribe<L, K>(
    log: &L,
    registry: &Arc<SubscriberRegistry>,
    amount: u64,
    sink: &mut K,
    cancel: &CancellationToken,
) -> Result<SubscribeOutcome>
where
    L: MessageLog,
    K: MessageSink,
{
    let history = log.scan(amount, ScanOrder::for_amount(amount)).await?;

    let mut replayed = 0;
    for msg in &history {
        tokio::select! {
            _ = cancel.cancelled() => {
                return Ok(SubscribeOutcome { replayed, forwarded: 0, reason: StopReason::Cancelled });
            }
            result = sink.send_message(msg) => match result {
                Ok(()) => replayed += 1,
                Err(e) => {
                    tracing::warn!(message_id = msg.id, error = %e, "Failed to replay message, skipping");
                }
            }
        }
    }

    let mut subscription = registry.subscribe();
    let handle = subscription.handle();
    tracing::debug!(handle = %handle, replayed = replayed, "Live tail started");

    let mut forwarded = 0u64;
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break StopReason::Cancelled,
            next = subscription.recv() => {
                let Some(msg) = next else {
                    break StopReason::Closed;
                };
                tokio::select! {
                    _ = cancel.cancelled() => break StopReason::Cancelled,
                    result = sink.send_message(&msg) => {
                        if let Err(e) = result {
                            tracing::debug!(handle = %handle, error = %e, "Live send failed");
                            break StopReason::PeerGone;
                        }
                        forwarded += 1;
                    }
                }
            }
        }
    };

    drop(subscription);
    tracing::debug!(
        handle = %handle,
        forwarded = forwarded,
        reason = ?reason,
        "Live tail ended"
    );

    Ok(SubscribeOutcome {
        replayed,
        forwarded,
        reason,
    })
}
