//! Relay frames
//!
//! ```text
//! +------+----------------+---------------------+
//! | type | length (u32 BE)| payload[length]     |
//! +------+----------------+---------------------+
//! ```
//!
//! Strings inside a payload are a `u32` BE byte length followed by UTF-8.
//!
//! Frame types:
//! ```text
//! 0x01 Submit       author
//! 0x02 Subscribe    amount: u64
//! 0x03 Text         text
//! 0x04 EndOfStream  -
//! 0x10 Count        count: u64
//! 0x11 Message      id: u64, author, time (RFC 3339), text
//! 0x1F Error        reason
//! ```

use bytes::{Buf, BufMut, BytesMut};

use super::constants::*;
use crate::error::ProtocolError;
use crate::message::{format_time, parse_time, Message};

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Open a write stream under `author` (empty = server default)
    Submit { author: String },
    /// Open a read stream replaying `amount` records (0 = all)
    Subscribe { amount: u64 },
    /// One message body on a write stream
    Text(String),
    /// Writer is done
    EndOfStream,
    /// Number of messages persisted for a write stream
    Count(u64),
    /// A message on a read stream
    Message(Message),
    /// Fatal error, connection closes after this
    Error(String),
}

impl Frame {
    /// Frame type byte
    pub fn type_id(&self) -> u8 {
        match self {
            Frame::Submit { .. } => FRAME_SUBMIT,
            Frame::Subscribe { .. } => FRAME_SUBSCRIBE,
            Frame::Text(_) => FRAME_TEXT,
            Frame::EndOfStream => FRAME_END_OF_STREAM,
            Frame::Count(_) => FRAME_COUNT,
            Frame::Message(_) => FRAME_MESSAGE,
            Frame::Error(_) => FRAME_ERROR,
        }
    }

    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Submit { .. } => "Submit",
            Frame::Subscribe { .. } => "Subscribe",
            Frame::Text(_) => "Text",
            Frame::EndOfStream => "EndOfStream",
            Frame::Count(_) => "Count",
            Frame::Message(_) => "Message",
            Frame::Error(_) => "Error",
        }
    }

    /// Append the encoded frame to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut payload = BytesMut::new();
        match self {
            Frame::Message(msg) => return encode_message(msg, dst),
            Frame::Submit { author } => put_string(&mut payload, author),
            Frame::Subscribe { amount } => payload.put_u64(*amount),
            Frame::Text(text) => put_string(&mut payload, text),
            Frame::EndOfStream => {}
            Frame::Count(count) => payload.put_u64(*count),
            Frame::Error(reason) => put_string(&mut payload, reason),
        }
        put_frame(dst, self.type_id(), &payload);
    }

    /// Decode one frame from the front of `src`
    ///
    /// Returns `Ok(None)` if `src` does not hold a complete frame yet; nothing
    /// is consumed in that case.
    pub fn decode(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let frame_type = src[0];
        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                limit: max_frame_size,
            });
        }
        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let mut payload = src.split_to(len);

        let frame = match frame_type {
            FRAME_SUBMIT => Frame::Submit {
                author: get_string(&mut payload, "Submit")?,
            },
            FRAME_SUBSCRIBE => Frame::Subscribe {
                amount: get_u64(&mut payload, "Subscribe")?,
            },
            FRAME_TEXT => Frame::Text(get_string(&mut payload, "Text")?),
            FRAME_END_OF_STREAM => Frame::EndOfStream,
            FRAME_COUNT => Frame::Count(get_u64(&mut payload, "Count")?),
            FRAME_MESSAGE => {
                let id = get_u64(&mut payload, "Message")?;
                let author = get_string(&mut payload, "Message")?;
                let time = get_string(&mut payload, "Message")?;
                let text = get_string(&mut payload, "Message")?;
                let time = parse_time(&time).ok_or(ProtocolError::InvalidTimestamp(time))?;
                Frame::Message(Message::new(id, author, time, text))
            }
            FRAME_ERROR => Frame::Error(get_string(&mut payload, "Error")?),
            other => return Err(ProtocolError::UnknownFrameType(other)),
        };

        Ok(Some(frame))
    }
}

/// Encode a Message frame without cloning the message into a `Frame`
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    let time = format_time(&msg.time);
    let mut payload =
        BytesMut::with_capacity(8 + 12 + msg.author.len() + time.len() + msg.text.len());
    payload.put_u64(msg.id);
    put_string(&mut payload, &msg.author);
    put_string(&mut payload, &time);
    put_string(&mut payload, &msg.text);
    put_frame(dst, FRAME_MESSAGE, &payload);
}

fn put_frame(dst: &mut BytesMut, frame_type: u8, payload: &[u8]) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(frame_type);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
}

fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_u32(s.len() as u32);
    dst.put_slice(s.as_bytes());
}

fn get_u64(src: &mut BytesMut, frame: &'static str) -> Result<u64, ProtocolError> {
    if src.remaining() < 8 {
        return Err(ProtocolError::Truncated(frame));
    }
    Ok(src.get_u64())
}

fn get_string(src: &mut BytesMut, frame: &'static str) -> Result<String, ProtocolError> {
    if src.remaining() < 4 {
        return Err(ProtocolError::Truncated(frame));
    }
    let len = src.get_u32() as usize;
    if src.remaining() < len {
        return Err(ProtocolError::Truncated(frame));
    }
    let bytes = src.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}
