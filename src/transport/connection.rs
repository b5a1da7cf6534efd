//! Per-connection state machine.
//!
//! ```text
//! New -> Greeted -> AwaitingData -> Valid | Invalid | Error -> Closed
//! ```
//!
//! Exactly one request is processed per connection. Whatever the outcome, the
//! host is notified once and the socket is shut down once.

use crate::error::{Result, VotifierError};
use crate::protocol::handshake;
use crate::protocol::message::Vote;
use crate::protocol::validator::VoteValidator;
use crate::service::events::{ConnectionFailure, EventSink};
use crate::utils::timeout::{self, with_deadline};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Greeted,
    AwaitingData,
    /// A vote was verified and delivered
    Valid,
    /// The request was refused
    Invalid,
    /// The connection failed before a request could be judged
    Error,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Valid | ConnectionState::Invalid | ConnectionState::Error
        )
    }
}

/// Limits applied to every connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Idle timeout measured from acceptance
    pub timeout: Duration,
    /// Upper bound on the bytes read from the first chunk
    pub max_frame_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            timeout: timeout::DEFAULT_TIMEOUT,
            max_frame_size: crate::config::MAX_FRAME_SIZE,
        }
    }
}

/// Drives one accepted connection from greeting to close
pub struct ConnectionHandler<S> {
    stream: S,
    peer: SocketAddr,
    state: ConnectionState,
    validator: Arc<VoteValidator>,
    settings: ConnectionSettings,
    accepted_at: Instant,
    bytes_received: usize,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a freshly accepted stream. The idle timeout starts now.
    pub fn new(
        stream: S,
        peer: SocketAddr,
        validator: Arc<VoteValidator>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            stream,
            peer,
            state: ConnectionState::New,
            validator,
            settings,
            accepted_at: Instant::now(),
            bytes_received: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Bytes read from the peer so far
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Handle the connection to completion and report the outcome to `sink`.
    ///
    /// Returns the terminal state reached before the socket was closed.
    pub async fn run(&mut self, sink: &dyn EventSink) -> ConnectionState {
        let deadline = self.accepted_at + self.settings.timeout;
        let outcome = with_deadline(deadline, self.exchange()).await;

        let terminal = match outcome {
            Ok(vote) => {
                info!(
                    service = %vote.service_name,
                    username = %vote.username,
                    "Vote received"
                );
                sink.on_vote(vote);
                ConnectionState::Valid
            }
            Err(error) => {
                let terminal = if error.is_rejection() {
                    ConnectionState::Invalid
                } else {
                    ConnectionState::Error
                };
                warn!(error = %error, "Connection failed");
                sink.on_error(ConnectionFailure {
                    peer: self.peer,
                    error,
                });
                terminal
            }
        };

        self.state = terminal;
        self.close().await;
        terminal
    }

    async fn exchange(&mut self) -> Result<Vote> {
        handshake::send_greetings(&mut self.stream, self.validator.challenge()).await?;
        self.state = ConnectionState::Greeted;

        let frame = self.read_frame().await?;
        self.validator.validate(&frame)
    }

    /// Read the first chunk the peer sends.
    async fn read_frame(&mut self) -> Result<BytesMut> {
        self.state = ConnectionState::AwaitingData;

        let limit = self.settings.max_frame_size;
        let mut buf = BytesMut::with_capacity(limit);
        let read = (&mut self.stream)
            .take(limit as u64)
            .read_buf(&mut buf)
            .await
            .map_err(|e| VotifierError::SocketError(e.to_string()))?;

        if read == 0 {
            return Err(VotifierError::ConnectionClosed);
        }

        self.bytes_received += read;
        debug!(bytes = read, "Frame received");
        Ok(buf)
    }

    /// Shut the stream down. Calling this on a closed connection does nothing.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "Shutdown after close failed");
        }
        self.state = ConnectionState::Closed;
        debug!("Connection closed");
    }
}
