//! Session context
//!
//! Identity of one client connection, carried into log fields.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// What a connection turned out to be after its first frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Waiting for the request frame
    Pending,
    /// Writer (Submit)
    Writer,
    /// Reader (Subscribe)
    Reader,
}

/// Per-connection information
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Role chosen by the request frame
    pub role: SessionRole,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            role: SessionRole::Pending,
            connected_at: Instant::now(),
        }
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_new_context_is_pending() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50052);
        let ctx = SessionContext::new(7, addr);

        assert_eq!(ctx.session_id, 7);
        assert_eq!(ctx.role, SessionRole::Pending);
        assert_eq!(ctx.peer_addr.port(), 50052);
    }
}
