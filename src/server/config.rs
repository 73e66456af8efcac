//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PORT};

/// Environment variable for the bind address
pub const ENV_BIND_ADDR: &str = "RELAY_BIND_ADDR";
/// Environment variable for the connection limit
pub const ENV_MAX_CONNECTIONS: &str = "RELAY_MAX_CONNECTIONS";
/// Environment variable for the fallback author label
pub const ENV_DEFAULT_AUTHOR: &str = "RELAY_DEFAULT_AUTHOR";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Time allowed for a new connection to send its request frame
    pub connection_timeout: Duration,

    /// Time to wait for in-flight connections on shutdown
    pub shutdown_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Largest accepted frame, header excluded
    pub max_frame_size: usize,

    /// Largest accepted message text in bytes
    pub max_message_len: usize,

    /// Author used when a writer sends an empty label
    pub default_author: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            connection_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            default_author: "anonymous".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Defaults overridden by `RELAY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = value.trim().parse().map_err(|_| ConfigError {
                key: ENV_BIND_ADDR,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = value.trim().parse().map_err(|_| ConfigError {
                key: ENV_MAX_CONNECTIONS,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(ENV_DEFAULT_AUTHOR) {
            let value = value.trim();
            if value.is_empty() {
                return Err(ConfigError {
                    key: ENV_DEFAULT_AUTHOR,
                    value: value.to_string(),
                });
            }
            config.default_author = value.to_string();
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the frame size limit
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the message length limit
    ///
    /// A text frame also has to fit in `max_frame_size`, so the effective
    /// limit is the smaller of the two.
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Set the fallback author label
    pub fn default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = author.into();
        self
    }
}
