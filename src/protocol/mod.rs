//! Relay wire protocol
//!
//! A connection opens with one request frame that picks the operation:
//!
//! ```text
//! Submit:     c: Submit{author}  c: Text* c: EndOfStream   s: Count
//! Subscribe:  c: Subscribe{n}    s: Message* (history, then live tail)
//! ```
//!
//! The server may send `Error` before closing on any fatal failure.

pub mod codec;
pub mod constants;
pub mod frame;

pub use codec::{FrameReader, FrameWriter};
pub use frame::Frame;
