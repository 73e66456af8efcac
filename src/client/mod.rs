//! Relay client
//!
//! Provides the client side of both operations:
//! - submitting messages (from a list or from line input ended by `\q`)
//! - subscribing to history plus the live feed

pub mod config;
pub mod connector;
pub mod input;

pub use config::ClientConfig;
pub use connector::{RelayClient, Subscriber};
pub use input::{LineInput, QUIT_SENTINEL};
