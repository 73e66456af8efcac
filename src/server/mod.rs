//! Relay server
//!
//! ```text
//!  TcpListener ──accept──► Connection (one task each)
//!                              │
//!                 Submit ──────┼────── Subscribe
//!                   │                     │
//!          log.append + broadcast    replay + live tail
//! ```

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::RelayServer;
