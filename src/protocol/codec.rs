//! Framed reader and writer over async byte streams

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::DEFAULT_MAX_FRAME_SIZE;
use super::frame::{encode_message, Frame};
use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Reads frames from the inbound half of a connection
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame size limit
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_size(reader, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reader with a custom frame size limit
    pub fn with_max_frame_size(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(8 * 1024),
            max_frame_size,
        }
    }

    /// Read the next frame
    ///
    /// `Ok(None)` means the peer closed the stream cleanly between frames.
    /// A close in the middle of a frame is [`ProtocolError::PrematureEof`].
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buffer, self.max_frame_size)? {
                return Ok(Some(frame));
            }

            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::PrematureEof.into());
            }
        }
    }
}

/// Writes frames to the outbound half of a connection
pub struct FrameWriter<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Encode and flush one frame
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        frame.encode(&mut self.buffer);
        self.flush_buffer().await
    }

    /// Encode and flush one Message frame
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        encode_message(msg, &mut self.buffer);
        self.flush_buffer().await
    }

    /// Shut down the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        let result = self.writer.write_all(&self.buffer).await;
        self.buffer.clear();
        result?;
        self.writer.flush().await?;
        Ok(())
    }
}
