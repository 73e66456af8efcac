//! Per-connection message channels
//!
//! The write and read paths do not talk to sockets directly. They pull texts
//! from a [`TextSource`] and push messages into a [`MessageSink`]; the server
//! plugs the wire codec in, tests plug in plain tokio channels.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::{Error, ProtocolError, Result};
use crate::message::Message;
use crate::protocol::{Frame, FrameReader, FrameWriter};

/// Inbound half of a writer connection
pub trait TextSource: Send {
    /// Next message body, or `Ok(None)` once the writer signalled end of input
    fn next_text(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Outbound half of a reader connection
pub trait MessageSink: Send {
    /// Deliver one message to the peer
    fn send_message(&mut self, msg: &Message) -> impl Future<Output = Result<()>> + Send;
}

/// Text frames of a Submit stream
///
/// `Text` frames yield their body, `EndOfStream` ends the input. A socket that
/// closes before `EndOfStream` is a transport failure, as is any other frame.
pub struct TextFrames<'a, R> {
    reader: &'a mut FrameReader<R>,
    max_message_len: usize,
}

impl<'a, R> TextFrames<'a, R> {
    /// Wrap a frame reader, rejecting bodies longer than `max_message_len`
    pub fn new(reader: &'a mut FrameReader<R>, max_message_len: usize) -> Self {
        Self {
            reader,
            max_message_len,
        }
    }
}

impl<R: AsyncRead + Unpin + Send> TextSource for TextFrames<'_, R> {
    async fn next_text(&mut self) -> Result<Option<String>> {
        match self.reader.read_frame().await? {
            Some(Frame::Text(text)) if text.len() > self.max_message_len => {
                Err(ProtocolError::MessageTooLong {
                    len: text.len(),
                    limit: self.max_message_len,
                }
                .into())
            }
            Some(Frame::Text(text)) => Ok(Some(text)),
            Some(Frame::EndOfStream) => Ok(None),
            Some(other) => Err(ProtocolError::UnexpectedFrame(other.name().to_string()).into()),
            None => Err(ProtocolError::PrematureEof.into()),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> MessageSink for FrameWriter<W> {
    async fn send_message(&mut self, msg: &Message) -> Result<()> {
        self.write_message(msg).await
    }
}

impl TextSource for mpsc::Receiver<String> {
    async fn next_text(&mut self) -> Result<Option<String>> {
        Ok(self.recv().await)
    }
}

impl MessageSink for mpsc::Sender<Message> {
    async fn send_message(&mut self, msg: &Message) -> Result<()> {
        self.send(msg.clone()).await.map_err(|_| Error::Closed)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buf);
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_text_frames_until_end_of_stream() {
        let bytes = wire(&[
            Frame::Text("one".into()),
            Frame::Text("two".into()),
            Frame::EndOfStream,
        ]);
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&bytes).build());
        let mut source = TextFrames::new(&mut reader, 1024);

        assert_eq!(source.next_text().await.unwrap().as_deref(), Some("one"));
        assert_eq!(source.next_text().await.unwrap().as_deref(), Some("two"));
        assert_eq!(source.next_text().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_socket_close_before_end_is_error() {
        let bytes = wire(&[Frame::Text("one".into())]);
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&bytes).build());
        let mut source = TextFrames::new(&mut reader, 1024);

        source.next_text().await.unwrap();
        let err = source.next_text().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::PrematureEof)));
    }

    #[tokio::test]
    async fn test_long_text_rejected() {
        let bytes = wire(&[Frame::Text("x".repeat(10))]);
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&bytes).build());
        let mut source = TextFrames::new(&mut reader, 4);

        let err = source.next_text().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MessageTooLong { len: 10, limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_unexpected_frame() {
        let bytes = wire(&[Frame::Subscribe { amount: 1 }]);
        let mut reader = FrameReader::new(tokio_test::io::Builder::new().read(&bytes).build());
        let mut source = TextFrames::new(&mut reader, 4);

        let err = source.next_text().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnexpectedFrame(ref name)) if name == "Subscribe"
        ));
    }

    #[tokio::test]
    async fn test_closed_sender_sink() {
        let (mut tx, rx) = mpsc::channel::<Message>(1);
        drop(rx);
        let msg = Message::new(1, "ann", crate::message::now(), "hi");
        assert!(matches!(tx.send_message(&msg).await, Err(Error::Closed)));
    }
}
