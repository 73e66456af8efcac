//! Relay server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::Result;
use crate::log::MessageLog;
use crate::registry::{RegistryConfig, SubscriberRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Relay server
pub struct RelayServer<L: MessageLog> {
    config: Arc<ServerConfig>,
    log: Arc<L>,
    registry: Arc<SubscriberRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl<L: MessageLog> RelayServer<L> {
    /// Create a new server with the given configuration and log
    pub fn new(config: ServerConfig, log: L) -> Self {
        Self::with_registry_config(config, log, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        log: L,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            log: Arc::new(log),
            registry: Arc::new(SubscriberRegistry::with_config(registry_config)),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get a reference to the message log
    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// Returns only once [`shutdown_token`](Self::shutdown_token) is cancelled.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Relay server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested");
            }
            _ = self.accept_loop(&listener) => {}
        }

        drop(listener);
        self.drain().await;
        Ok(())
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let mut connection = Connection::new(
            session_id,
            socket,
            peer_addr,
            Arc::clone(&self.config),
            Arc::clone(&self.log),
            Arc::clone(&self.registry),
            self.shutdown.child_token(),
        );

        self.tracker.spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run().await {
                if e.is_disconnect() {
                    tracing::debug!(session_id = session_id, error = %e, "Peer disconnected");
                } else {
                    tracing::warn!(session_id = session_id, error = %e, "Connection error");
                }
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Stop readers and wait for in-flight connections
    ///
    /// Writers are not interrupted mid-append; they stop at the next message
    /// boundary.
    async fn drain(&self) {
        self.shutdown.cancel();
        self.registry.close_all();
        self.tracker.close();

        let remaining = self.tracker.len();
        if remaining > 0 {
            tracing::info!(connections = remaining, "Waiting for connections to finish");
        }

        if tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                connections = self.tracker.len(),
                "Shutdown timeout elapsed with connections still open"
            );
        }

        tracing::info!("Relay server stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::log::MemoryLog;

    #[test]
    fn test_accessors_reflect_config() {
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        let config = ServerConfig::with_addr(addr).max_connections(3);
        let server = RelayServer::new(config, MemoryLog::new());

        assert_eq!(server.bind_addr(), addr);
        assert_eq!(server.config().max_connections, 3);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_serve_stops_on_token() {
        let server = Arc::new(RelayServer::new(ServerConfig::default(), MemoryLog::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let token = server.shutdown_token();
        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener, std::future::pending()).await }
        });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_limit_rejects_extra_peer() {
        let config = ServerConfig::default()
            .max_connections(1)
            .connection_timeout(Duration::from_secs(5));
        let server = Arc::new(RelayServer::new(config, MemoryLog::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let token = server.shutdown_token();
        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener, std::future::pending()).await }
        });

        let _first = TcpStream::connect(addr).await.unwrap();
        while server.tracker.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // The second socket is accepted then dropped without a handler
        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(
            Duration::from_secs(1),
            tokio::io::AsyncReadExt::read(&mut second, &mut buf),
        )
        .await
        .unwrap()
        .unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(server.tracker.len(), 1);

        token.cancel();
        task.await.unwrap().unwrap();
    }
}
