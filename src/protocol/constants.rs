//! Wire protocol constants

/// Default TCP port
pub const DEFAULT_PORT: u16 = 50052;

/// Frame header: 1 byte type + 4 byte big-endian payload length
pub const HEADER_SIZE: usize = 5;

/// Largest payload accepted by default
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Longest message body accepted by default
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024;

// Client -> server
pub const FRAME_SUBMIT: u8 = 0x01;
pub const FRAME_SUBSCRIBE: u8 = 0x02;
pub const FRAME_TEXT: u8 = 0x03;
pub const FRAME_END_OF_STREAM: u8 = 0x04;

// Server -> client
pub const FRAME_COUNT: u8 = 0x10;
pub const FRAME_MESSAGE: u8 = 0x11;
pub const FRAME_ERROR: u8 = 0x1F;
