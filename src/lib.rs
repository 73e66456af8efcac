//! relay-rs: durable message relay with live fan-out
//!
//! Writers stream text messages to the server, which persists each one in a
//! [`MessageLog`] and then broadcasts it to every connected subscriber.
//! Subscribers first receive a slice of history, then the live tail.
//!
//! # Example
//! ```no_run
//! use relay_rs::{FileLog, RelayServer, ServerConfig};
//!
//! # async fn example() -> relay_rs::error::Result<()> {
//! let log = FileLog::open("messages.jsonl").await?;
//! let server = RelayServer::new(ServerConfig::default(), log);
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod log;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use client::{ClientConfig, RelayClient, Subscriber};
pub use error::{Error, Result};
pub use log::{FileLog, MemoryLog, MessageLog, ScanOrder};
#[cfg(feature = "postgres")]
pub use log::PgLog;
pub use message::Message;
pub use registry::{RegistryConfig, SubscriberHandle, SubscriberRegistry, Subscription};
pub use server::{RelayServer, ServerConfig};
