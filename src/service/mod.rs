//! # Host-Facing Services
//!
//! The token store that backs signature verification and the event sink through
//! which votes and failures reach the host application.

pub mod events;
pub mod tokens;

pub use events::{channel_sink, CallbackSink, ChannelSink, ConnectionFailure, EventSink};
pub use tokens::{Token, TokenStore, DEFAULT_PLATFORM};
