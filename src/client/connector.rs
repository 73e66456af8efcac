//! Relay client connection

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Error, ProtocolError, Result};
use crate::message::Message;
use crate::protocol::{Frame, FrameReader, FrameWriter};
use crate::session::TextSource;

use super::config::ClientConfig;

/// Client for both relay operations
///
/// Each call opens its own connection, as the server expects one operation
/// per connection.
///
/// # Example
/// ```no_run
/// use relay_rs::client::{ClientConfig, RelayClient};
///
/// # async fn example() -> relay_rs::error::Result<()> {
/// let client = RelayClient::new(ClientConfig::new("localhost:50052"));
///
/// let count = client.submit("ann", ["hello", "world"]).await?;
/// assert_eq!(count, 2);
///
/// let mut feed = client.subscribe(10).await?;
/// while let Some(msg) = feed.next_message().await? {
///     println!("{}", msg);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RelayClient {
    config: ClientConfig,
}

impl RelayClient {
    /// Create a client
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit `texts` under `author` and return the server's count
    ///
    /// An empty author lets the server pick its default label.
    pub async fn submit<I, S>(&self, author: &str, texts: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut conn = self.open(Frame::Submit {
            author: author.to_string(),
        })
        .await?;

        for text in texts {
            if let Err(e) = conn.writer.write_frame(&Frame::Text(text.into())).await {
                return Err(conn.remote_error_or(e).await);
            }
        }

        conn.finish_submit().await
    }

    /// Submit every text `source` yields until it ends
    pub async fn submit_stream<T: TextSource>(&self, author: &str, source: &mut T) -> Result<u64> {
        let mut conn = self.open(Frame::Submit {
            author: author.to_string(),
        })
        .await?;

        while let Some(text) = source.next_text().await? {
            if let Err(e) = conn.writer.write_frame(&Frame::Text(text)).await {
                return Err(conn.remote_error_or(e).await);
            }
        }

        conn.finish_submit().await
    }

    /// Open a read stream
    ///
    /// `amount == 0` replays the whole history oldest-first. `amount > 0`
    /// replays the `amount` most recent messages newest-first. Live messages
    /// follow either way.
    pub async fn subscribe(&self, amount: u64) -> Result<Subscriber> {
        let conn = self.open(Frame::Subscribe { amount }).await?;

        Ok(Subscriber {
            reader: conn.reader,
            writer: conn.writer,
        })
    }

    async fn open(&self, request: Frame) -> Result<Conn> {
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr.as_str()),
        )
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;

        if self.config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        tracing::debug!(addr = %self.config.addr, request = request.name(), "Connected to relay");

        let (read_half, write_half) = stream.into_split();
        let mut conn = Conn {
            reader: FrameReader::with_max_frame_size(read_half, self.config.max_frame_size),
            writer: FrameWriter::new(write_half),
        };
        conn.writer.write_frame(&request).await?;
        Ok(conn)
    }
}

struct Conn {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl Conn {
    async fn finish_submit(&mut self) -> Result<u64> {
        if let Err(e) = self.writer.write_frame(&Frame::EndOfStream).await {
            return Err(self.remote_error_or(e).await);
        }

        match self.reader.read_frame().await? {
            Some(Frame::Count(count)) => Ok(count),
            Some(Frame::Error(reason)) => Err(Error::Remote(reason)),
            Some(other) => Err(ProtocolError::UnexpectedFrame(other.name().to_string()).into()),
            None => Err(ProtocolError::PrematureEof.into()),
        }
    }

    /// A failed write usually means the server gave up on us; prefer its reason
    async fn remote_error_or(&mut self, error: Error) -> Error {
        match self.reader.read_frame().await {
            Ok(Some(Frame::Error(reason))) => Error::Remote(reason),
            _ => error,
        }
    }
}

/// Read stream opened by [`RelayClient::subscribe`]
pub struct Subscriber {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl Subscriber {
    /// Next message, history first, then live
    ///
    /// `Ok(None)` means the server closed the stream (shutdown or this
    /// subscriber fell too far behind).
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        match self.reader.read_frame().await? {
            Some(Frame::Message(msg)) => Ok(Some(msg)),
            Some(Frame::Error(reason)) => Err(Error::Remote(reason)),
            Some(other) => Err(ProtocolError::UnexpectedFrame(other.name().to_string()).into()),
            None => Ok(None),
        }
    }

    /// Leave the stream
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await
    }
}
