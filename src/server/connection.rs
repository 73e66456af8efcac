//! Per-connection handler
//!
//! Reads the request frame, then runs either the write path or the read path
//! over the framed socket until the operation ends.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ProtocolError, Result};
use crate::log::MessageLog;
use crate::protocol::{Frame, FrameReader, FrameWriter};
use crate::registry::SubscriberRegistry;
use crate::server::config::ServerConfig;
use crate::session::{
    submit, subscribe, SessionContext, SessionRole, SubscribeOutcome, TextFrames, TextSource,
};

/// One client connection
pub struct Connection<T, L> {
    ctx: SessionContext,
    reader: FrameReader<ReadHalf<T>>,
    writer: FrameWriter<WriteHalf<T>>,
    config: Arc<ServerConfig>,
    log: Arc<L>,
    registry: Arc<SubscriberRegistry>,
    cancel: CancellationToken,
}

impl<T, L> Connection<T, L>
where
    T: AsyncRead + AsyncWrite + Send,
    L: MessageLog,
{
    /// Wrap an accepted stream
    ///
    /// `cancel` should be a child of the server's shutdown token.
    pub fn new(
        session_id: u64,
        stream: T,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        log: Arc<L>,
        registry: Arc<SubscriberRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            ctx: SessionContext::new(session_id, peer_addr),
            reader: FrameReader::with_max_frame_size(read_half, config.max_frame_size),
            writer: FrameWriter::new(write_half),
            config,
            log,
            registry,
            cancel,
        }
    }

    /// Session information
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Serve the connection to completion
    pub async fn run(&mut self) -> Result<()> {
        let request = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(self.config.connection_timeout, self.reader.read_frame()) => {
                match result {
                    Ok(frame) => frame?,
                    Err(_) => {
                        tracing::debug!(
                            session_id = self.ctx.session_id,
                            "No request frame before timeout"
                        );
                        return Err(std::io::Error::from(std::io::ErrorKind::TimedOut).into());
                    }
                }
            }
        };

        let result = match request {
            None => return Ok(()),
            Some(Frame::Submit { author }) => self.handle_submit(author).await,
            Some(Frame::Subscribe { amount }) => self.handle_subscribe(amount).await.map(|_| ()),
            Some(other) => Err(ProtocolError::UnexpectedFrame(other.name().to_string()).into()),
        };

        if let Err(ref e) = result {
            if !e.is_disconnect() {
                self.send_error(e).await;
                self.linger().await;
            }
        }

        result
    }

    async fn handle_submit(&mut self, author: String) -> Result<()> {
        self.ctx.role = SessionRole::Writer;

        let author = match author.trim() {
            "" => self.config.default_author.clone(),
            trimmed => trimmed.to_string(),
        };

        tracing::debug!(
            session_id = self.ctx.session_id,
            peer = %self.ctx.peer_addr,
            author = %author,
            "Writer connected"
        );

        let frames = TextFrames::new(&mut self.reader, self.config.max_message_len);
        let mut source = UntilCancelled {
            inner: frames,
            cancel: &self.cancel,
        };
        let count = submit(&*self.log, &self.registry, &author, &mut source).await?;

        self.writer.write_frame(&Frame::Count(count)).await?;

        tracing::info!(
            session_id = self.ctx.session_id,
            author = %author,
            count = count,
            "Submit complete"
        );

        Ok(())
    }

    async fn handle_subscribe(&mut self, amount: u64) -> Result<SubscribeOutcome> {
        self.ctx.role = SessionRole::Reader;

        tracing::debug!(
            session_id = self.ctx.session_id,
            peer = %self.ctx.peer_addr,
            amount = amount,
            "Reader connected"
        );

        let cancel = self.cancel.child_token();

        // The peer never speaks again on a read stream; its read half only
        // tells us when it leaves.
        let outcome = {
            let session = subscribe(
                &*self.log,
                &self.registry,
                amount,
                &mut self.writer,
                &cancel,
            );
            tokio::pin!(session);

            tokio::select! {
                result = &mut session => result,
                _ = watch_peer(&mut self.reader, self.ctx.session_id) => {
                    cancel.cancel();
                    session.await
                }
            }
        }?;

        let _ = self.writer.shutdown().await;

        tracing::info!(
            session_id = self.ctx.session_id,
            replayed = outcome.replayed,
            forwarded = outcome.forwarded,
            reason = ?outcome.reason,
            duration_ms = self.ctx.duration().as_millis() as u64,
            "Subscription ended"
        );

        Ok(outcome)
    }

    /// Close our side and discard input until the peer hangs up
    ///
    /// Closing with unread input would reset the connection and could
    /// destroy the error frame before the peer reads it.
    async fn linger(&mut self) {
        let _ = self.writer.shutdown().await;
        let _ = tokio::time::timeout(LINGER_TIMEOUT, async {
            while let Ok(Some(_)) = self.reader.read_frame().await {}
        })
        .await;
    }

    async fn send_error(&mut self, error: &Error) {
        let frame = Frame::Error(error.to_string());
        if let Err(e) = self.writer.write_frame(&frame).await {
            tracing::debug!(
                session_id = self.ctx.session_id,
                error = %e,
                "Failed to send error frame"
            );
        }
    }
}

/// How long to keep reading after an error frame so the peer can see it
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);

/// Wait until the peer closes its side of a read stream
async fn watch_peer<R: AsyncRead + Unpin>(reader: &mut FrameReader<R>, session_id: u64) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                tracing::debug!(
                    session_id = session_id,
                    frame = frame.name(),
                    "Ignoring frame on read stream"
                );
            }
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(session_id = session_id, error = %e, "Reader input failed");
                return;
            }
        }
    }
}

/// Text source that gives up waiting for input once `cancel` fires
///
/// An append already in progress is never interrupted; cancellation is only
/// observed between messages.
struct UntilCancelled<'a, S> {
    inner: S,
    cancel: &'a CancellationToken,
}

impl<S: TextSource> TextSource for UntilCancelled<'_, S> {
    async fn next_text(&mut self) -> Result<Option<String>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Closed),
            next = self.inner.next_text() => next,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use tokio::io::{duplex, DuplexStream};

    use super::*;
    use crate::log::{MemoryLog, ScanOrder};
    use crate::message::now;
    use crate::session::StopReason;

    struct Harness {
        log: Arc<MemoryLog>,
        registry: Arc<SubscriberRegistry>,
        cancel: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: Arc::new(MemoryLog::new()),
                registry: Arc::new(SubscriberRegistry::new()),
                cancel: CancellationToken::new(),
            }
        }

        /// Server-side connection plus the client's framed halves
        fn connect(
            &self,
            config: ServerConfig,
        ) -> (
            Connection<DuplexStream, MemoryLog>,
            FrameReader<ReadHalf<DuplexStream>>,
            FrameWriter<WriteHalf<DuplexStream>>,
        ) {
            let (server, client) = duplex(64 * 1024);
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000);
            let conn = Connection::new(
                1,
                server,
                addr,
                Arc::new(config),
                Arc::clone(&self.log),
                Arc::clone(&self.registry),
                self.cancel.child_token(),
            );
            let (r, w) = tokio::io::split(client);
            (conn, FrameReader::new(r), FrameWriter::new(w))
        }
    }

    #[tokio::test]
    async fn test_submit_returns_count() {
        let h = Harness::new();
        let (mut conn, mut rx, mut tx) = h.connect(ServerConfig::default());

        let server = tokio::spawn(async move { conn.run().await });

        tx.write_frame(&Frame::Submit {
            author: "ann".into(),
        })
        .await
        .unwrap();
        for text in ["one", "two"] {
            tx.write_frame(&Frame::Text(text.into())).await.unwrap();
        }
        tx.write_frame(&Frame::EndOfStream).await.unwrap();

        assert_eq!(rx.read_frame().await.unwrap(), Some(Frame::Count(2)));
        server.await.unwrap().unwrap();

        let stored = h.log.scan(0, ScanOrder::OldestFirst).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|m| m.author == "ann"));
    }

    #[tokio::test]
    async fn test_empty_author_uses_default() {
        let h = Harness::new();
        let (mut conn, mut rx, mut tx) =
            h.connect(ServerConfig::default().default_author("TEST"));

        let server = tokio::spawn(async move { conn.run().await });

        tx.write_frame(&Frame::Submit { author: " ".into() })
            .await
            .unwrap();
        tx.write_frame(&Frame::Text("hi".into())).await.unwrap();
        tx.write_frame(&Frame::EndOfStream).await.unwrap();

        assert_eq!(rx.read_frame().await.unwrap(), Some(Frame::Count(1)));
        server.await.unwrap().unwrap();

        let stored = h.log.scan(1, ScanOrder::NewestFirst).await.unwrap();
        assert_eq!(stored[0].author, "TEST");
    }

    #[tokio::test]
    async fn test_oversized_text_gets_error_frame() {
        let h = Harness::new();
        let (mut conn, mut rx, mut tx) = h.connect(ServerConfig::default().max_message_len(4));

        let server = tokio::spawn(async move { conn.run().await });

        tx.write_frame(&Frame::Submit {
            author: "ann".into(),
        })
        .await
        .unwrap();
        tx.write_frame(&Frame::Text("fine".into())).await.unwrap();
        tx.write_frame(&Frame::Text("too long".into())).await.unwrap();

        match rx.read_frame().await.unwrap() {
            Some(Frame::Error(reason)) => assert!(reason.contains("exceeds limit")),
            other => panic!("expected error frame, got {:?}", other),
        }
        assert!(server.await.unwrap().is_err());

        // The message before the bad one stays persisted
        assert_eq!(h.log.len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_request_frame() {
        let h = Harness::new();
        let (mut conn, mut rx, mut tx) = h.connect(ServerConfig::default());

        let server = tokio::spawn(async move { conn.run().await });
        tx.write_frame(&Frame::Text("no request".into())).await.unwrap();

        assert!(matches!(
            rx.read_frame().await.unwrap(),
            Some(Frame::Error(_))
        ));
        assert!(server.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let h = Harness::new();
        let (mut conn, _rx, _tx) =
            h.connect(ServerConfig::default().connection_timeout(Duration::from_millis(20)));

        let err = conn.run().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn test_subscribe_replays_then_streams_live() {
        let h = Harness::new();
        for text in ["a", "b", "c"] {
            h.log.append("ann", now(), text).await.unwrap();
        }
        let (mut conn, mut rx, mut tx) = h.connect(ServerConfig::default());

        let server = tokio::spawn(async move { conn.run().await });
        tx.write_frame(&Frame::Subscribe { amount: 2 }).await.unwrap();

        let mut texts = Vec::new();
        for _ in 0..2 {
            match rx.read_frame().await.unwrap() {
                Some(Frame::Message(m)) => texts.push(m.text),
                other => panic!("expected message, got {:?}", other),
            }
        }
        assert_eq!(texts, ["c", "b"]);

        // Wait for registration before writing live
        while h.registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let live = h.log.append("bob", now(), "live").await.unwrap();
        h.registry.broadcast(Arc::new(live.clone()));

        assert_eq!(rx.read_frame().await.unwrap(), Some(Frame::Message(live)));

        // Closing our side ends the subscription and frees the slot
        tx.shutdown().await.unwrap();
        server.await.unwrap().unwrap();
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_ends_subscription() {
        let h = Harness::new();
        let (mut conn, _rx, mut tx) = h.connect(ServerConfig::default());

        let server = tokio::spawn(async move {
            let result = conn.run().await;
            (result, conn.context().role)
        });
        tx.write_frame(&Frame::Subscribe { amount: 0 }).await.unwrap();

        while h.registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.cancel.cancel();

        let (result, role) = tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(role, SessionRole::Reader);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_ends_subscription() {
        let h = Harness::new();
        let (mut conn, _rx, mut tx) = h.connect(ServerConfig::default());

        tx.write_frame(&Frame::Subscribe { amount: 0 }).await.unwrap();
        let request = conn.reader.read_frame().await.unwrap();
        assert_eq!(request, Some(Frame::Subscribe { amount: 0 }));

        let registry = Arc::clone(&h.registry);
        let closer = tokio::spawn(async move {
            while registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            registry.close_all();
        });

        let outcome = conn.handle_subscribe(0).await.unwrap();
        closer.await.unwrap();
        assert_eq!(outcome.reason, StopReason::Closed);
        assert_eq!(outcome.forwarded, 0);
    }
}
