//! Host-facing events.
//!
//! Validated votes and connection failures are handed to an [`EventSink`].
//! Delivery is fire-and-forget: the connection never waits on the host, and a
//! host that stopped listening only loses events.

use crate::error::VotifierError;
use crate::protocol::message::Vote;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::trace;

/// A connection-scoped failure reported to the host
#[derive(Debug)]
pub struct ConnectionFailure {
    /// Remote address of the offending connection
    pub peer: SocketAddr,
    pub error: VotifierError,
}

/// Receives the outcome of every connection.
pub trait EventSink: Send + Sync + 'static {
    fn on_vote(&self, vote: Vote);
    fn on_error(&self, failure: ConnectionFailure);
}

pub type VoteReceiver = mpsc::UnboundedReceiver<Vote>;
pub type ErrorReceiver = mpsc::UnboundedReceiver<ConnectionFailure>;

/// Sink that forwards votes and failures over two separate channels
#[derive(Debug, Clone)]
pub struct ChannelSink {
    votes: mpsc::UnboundedSender<Vote>,
    errors: mpsc::UnboundedSender<ConnectionFailure>,
}

/// Create a [`ChannelSink`] with its vote and error receivers.
pub fn channel_sink() -> (ChannelSink, VoteReceiver, ErrorReceiver) {
    let (votes, vote_rx) = mpsc::unbounded_channel();
    let (errors, error_rx) = mpsc::unbounded_channel();
    (ChannelSink { votes, errors }, vote_rx, error_rx)
}

impl EventSink for ChannelSink {
    fn on_vote(&self, vote: Vote) {
        if self.votes.send(vote).is_err() {
            trace!("Vote receiver dropped, discarding vote");
        }
    }

    fn on_error(&self, failure: ConnectionFailure) {
        if self.errors.send(failure).is_err() {
            trace!("Error receiver dropped, discarding failure");
        }
    }
}

/// Sink built from two callbacks
pub struct CallbackSink<V, E> {
    on_vote: V,
    on_error: E,
}

impl<V, E> CallbackSink<V, E>
where
    V: Fn(Vote) + Send + Sync + 'static,
    E: Fn(ConnectionFailure) + Send + Sync + 'static,
{
    pub fn new(on_vote: V, on_error: E) -> Self {
        Self { on_vote, on_error }
    }
}

impl<V, E> EventSink for CallbackSink<V, E>
where
    V: Fn(Vote) + Send + Sync + 'static,
    E: Fn(ConnectionFailure) + Send + Sync + 'static,
{
    fn on_vote(&self, vote: Vote) {
        (self.on_vote)(vote)
    }

    fn on_error(&self, failure: ConnectionFailure) {
        (self.on_error)(failure)
    }
}
