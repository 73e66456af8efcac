//! Per-connection session logic
//!
//! - [`submit`]: write path, persist then broadcast
//! - [`subscribe`]: read path, replay then live tail
//! - [`channel`]: the inbound/outbound abstractions both paths run over

pub mod channel;
pub mod context;
pub mod submit;
pub mod subscribe;

pub use channel::{MessageSink, TextFrames, TextSource};
pub use context::{SessionContext, SessionRole};
pub use submit::submit;
pub use subscribe::{subscribe, StopReason, SubscribeOutcome};
