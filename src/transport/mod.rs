//! # Transport Layer
//!
//! TCP listener and the per-connection state machine.
//!
//! ## Components
//! - **Connection**: greeting, single-frame read, validation, close
//! - **TCP**: accept loop with a connection cap and graceful shutdown

pub mod connection;
pub mod tcp;

pub use connection::{ConnectionHandler, ConnectionSettings, ConnectionState};
pub use tcp::VotifierServer;
