//! # Votifier Protocol
//!
//! A server for the Votifier v2 vote-notification protocol. Vote-listing sites
//! connect, receive a per-instance challenge, and send one HMAC-SHA256 signed
//! vote notification. Verified votes and per-connection failures are delivered
//! to the host through an [`EventSink`].
//!
//! ## Modules
//! - **config**: TOML and environment configuration with validation
//! - **core**: wire frame checks and envelope extraction
//! - **protocol**: greetings, message types, challenge, signatures, validation
//! - **service**: token store and event sinks
//! - **transport**: TCP listener and per-connection state machine
//! - **utils**: logging, metrics and timeouts
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use votifier_protocol::{channel_sink, VotifierConfig, VotifierServer};
//!
//! # async fn run() -> votifier_protocol::Result<()> {
//! let config = VotifierConfig::default();
//! let server = VotifierServer::new(&config)?;
//! let (sink, mut votes, _errors) = channel_sink();
//!
//! tokio::spawn(async move {
//!     while let Some(vote) = votes.recv().await {
//!         println!("{} voted on {}", vote.username, vote.service_name);
//!     }
//! });
//!
//! server.start(Arc::new(sink)).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::VotifierConfig;
pub use error::{Result, VotifierError};
pub use protocol::challenge::Challenge;
pub use protocol::message::{Vote, VoteTimestamp};
pub use protocol::validator::VoteValidator;
pub use service::{channel_sink, CallbackSink, ChannelSink, ConnectionFailure, EventSink};
pub use service::{Token, TokenStore};
pub use transport::VotifierServer;
