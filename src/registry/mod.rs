//! Subscriber registry for live fan-out
//!
//! The registry tracks every connection that is currently streaming the live
//! tail and delivers each persisted message to all of them.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SubscriberRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ Mutex {                      │
//!                 │   next_handle,               │
//!                 │   HashMap<Handle, mpsc::Tx>, │
//!                 │ }                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!    [Writer]               [Subscriber]            [Subscriber]
//!    log.append()           sub.recv()              sub.recv()
//!        │                       │                       │
//!        └──► registry.broadcast() ──► try_send ──► sink ──► TCP
//! ```
//!
//! # Slow subscribers
//!
//! Every subscriber owns a bounded channel. Broadcast uses `try_send`, so a
//! subscriber that stops reading fills its buffer and is evicted by the next
//! broadcast instead of stalling the writer or the other subscribers. Its
//! receiver drains whatever was buffered and then reports end-of-stream.

pub mod config;
pub mod handle;
pub mod store;

pub use config::RegistryConfig;
pub use handle::{SubscriberHandle, Subscription};
pub use store::{BroadcastReport, RegistryStats, SubscriberRegistry};
