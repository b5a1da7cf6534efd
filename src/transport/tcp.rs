//! Votifier TCP listener.
//!
//! Accepts connections, hands each to a [`ConnectionHandler`] on its own task and
//! drains active connections on shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::config::{ServerConfig, VotifierConfig};
use crate::error::Result;
use crate::protocol::challenge::Challenge;
use crate::protocol::message::Vote;
use crate::protocol::validator::VoteValidator;
use crate::service::events::{ConnectionFailure, EventSink};
use crate::service::tokens::TokenStore;
use crate::transport::connection::{ConnectionHandler, ConnectionSettings};
use crate::utils::metrics::Metrics;
use crate::utils::timeout::DRAIN_POLL_INTERVAL;

/// A Votifier server instance: one challenge, one token store, one listener.
pub struct VotifierServer {
    config: ServerConfig,
    validator: Arc<VoteValidator>,
    metrics: Arc<Metrics>,
}

impl VotifierServer {
    /// Load the token store and generate the instance challenge.
    ///
    /// # Errors
    /// Fails if the token file cannot be read or written, if the resulting token
    /// set is empty, or if the system RNG is unavailable.
    pub fn new(config: &VotifierConfig) -> Result<Self> {
        let tokens = TokenStore::from_config(&config.tokens)?;
        let challenge = Challenge::generate()?;
        Ok(Self::with_parts(config.server.clone(), tokens, challenge))
    }

    /// Build a server from already-initialised parts.
    pub fn with_parts(config: ServerConfig, tokens: TokenStore, challenge: Challenge) -> Self {
        let validator = VoteValidator::new(Arc::new(challenge), Arc::new(tokens));
        Self {
            config,
            validator: Arc::new(validator),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn challenge(&self) -> &Challenge {
        self.validator.challenge()
    }

    pub fn tokens(&self) -> &TokenStore {
        self.validator.tokens()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(listener)
    }

    /// Bind and serve until Ctrl-C.
    pub async fn start(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        // The original sender stays alive until serving ends
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received CTRL+C signal, shutting down");
                    let _ = shutdown_tx_clone.send(()).await;
                }
                Err(e) => warn!(error = %e, "Unable to listen for CTRL+C"),
            }
        });

        let result = self.start_with_shutdown(sink, shutdown_rx).await;
        drop(shutdown_tx);
        result
    }

    /// Bind and serve until a message arrives on `shutdown_rx`.
    pub async fn start_with_shutdown(
        &self,
        sink: Arc<dyn EventSink>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, sink, shutdown_rx).await
    }

    /// Run the accept loop on an already bound listener.
    ///
    /// Returns once a shutdown signal has been received and active connections
    /// have drained or `shutdown_timeout` has elapsed. A closed shutdown channel
    /// is not a signal: the loop keeps accepting.
    #[instrument(skip_all, fields(address = %local_addr(&listener)))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        sink: Arc<dyn EventSink>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        info!(platforms = self.tokens().len(), "Votifier listening");

        let limiter = Arc::new(Semaphore::new(
            self.config.max_connections.min(Semaphore::MAX_PERMITS),
        ));
        let settings = ConnectionSettings {
            timeout: self.config.connection_timeout,
            max_frame_size: self.config.max_frame_size,
        };
        let sink: Arc<dyn EventSink> = Arc::new(MeteredSink {
            inner: sink,
            metrics: Arc::clone(&self.metrics),
        });

        loop {
            tokio::select! {
                Some(()) = shutdown_rx.recv() => break,

                accept_result = listener.accept() => {
                    let (stream, peer) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&limiter).try_acquire_owned() else {
                        warn!(peer = %peer, limit = self.config.max_connections, "Connection limit reached, dropping connection");
                        self.metrics.connection_refused();
                        continue;
                    };

                    self.metrics.connection_established();
                    let metrics = Arc::clone(&self.metrics);
                    let validator = Arc::clone(&self.validator);
                    let sink = Arc::clone(&sink);

                    tokio::spawn(
                        async move {
                            let mut handler = ConnectionHandler::new(stream, peer, validator, settings);
                            handler.run(sink.as_ref()).await;
                            metrics.frame_received(handler.bytes_received() as u64);
                            metrics.connection_closed();
                            drop(permit);
                        }
                        .instrument(info_span!("connection", %peer)),
                    );
                }
            }
        }

        drop(listener);
        self.drain().await;
        self.metrics.log_metrics();
        Ok(())
    }

    /// Wait for active connections to finish, up to `shutdown_timeout`.
    async fn drain(&self) {
        info!("Shutting down server. Waiting for connections to close...");

        let timeout = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(timeout);

        while self.metrics.active() > 0 {
            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections = self.metrics.active(), "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {
                    info!(connections = self.metrics.active(), "Waiting for connections to close");
                }
            }
        }

        info!("All connections closed, shutting down");
    }
}

fn local_addr(listener: &TcpListener) -> String {
    listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Counts outcomes before forwarding them to the host's sink.
struct MeteredSink {
    inner: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
}

impl EventSink for MeteredSink {
    fn on_vote(&self, vote: Vote) {
        self.metrics.vote_accepted();
        self.inner.on_vote(vote);
    }

    fn on_error(&self, failure: ConnectionFailure) {
        self.metrics.failure(&failure.error);
        self.inner.on_error(failure);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::service::events::channel_sink;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn server(dir: &tempfile::TempDir, max_connections: usize) -> VotifierServer {
        let tokens = TokenStore::initialize(dir.path().join("tokens.json"), &["alpha"], true)
            .unwrap();
        let config = ServerConfig {
            bind_address: "127.0.0.1".into(),
            port: 0,
            max_connections,
            ..ServerConfig::default()
        };
        VotifierServer::with_parts(config, tokens, Challenge::generate().unwrap())
    }

    #[tokio::test]
    async fn test_server_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir, 4);
        assert_eq!(server.challenge().as_str().len(), 32);
        assert!(server.tokens().get("alpha").is_some());
        assert_eq!(server.metrics().active(), 0);
    }

    #[tokio::test]
    async fn test_refuses_beyond_connection_limit() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(server(&dir, 1));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sink, _votes, _errors) = channel_sink();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let running = Arc::clone(&server);
        let task = tokio::spawn(async move {
            running
                .serve(listener, Arc::new(sink), shutdown_rx)
                .await
        });

        // First client holds the only slot until its timeout
        let first = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(2), second.read_to_end(&mut buf))
            .await
            .expect("refused connection should be closed");
        assert!(read.is_err() || buf.is_empty());
        assert_eq!(server.metrics().snapshot().connections_refused, 1);

        drop(first);
        shutdown_tx.send(()).await.unwrap();
        task.await.unwrap().unwrap();
    }

    async fn assert_greets(addr: std::net::SocketAddr) {
        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut greeting = [0u8; 13];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut greeting))
            .await
            .expect("server should still greet")
            .unwrap();
        assert_eq!(&greeting, b"VOTIFIER 1.9\n");
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_keeps_serving() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(server(&dir, 4));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sink, _votes, _errors) = channel_sink();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        drop(shutdown_tx);

        let running = Arc::clone(&server);
        let task = tokio::spawn(async move {
            running.serve(listener, Arc::new(sink), shutdown_rx).await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!task.is_finished());
        assert_greets(addr).await;
        assert!(!task.is_finished());

        task.abort();
    }

    #[tokio::test]
    async fn test_idle_shutdown_sender_then_signal() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(server(&dir, 4));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sink, _votes, _errors) = channel_sink();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let running = Arc::clone(&server);
        let task = tokio::spawn(async move {
            running.serve(listener, Arc::new(sink), shutdown_rx).await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!task.is_finished());
        assert_greets(addr).await;

        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("serve should stop after the signal")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_huge_connection_limit_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(server(&dir, usize::MAX));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sink, _votes, _errors) = channel_sink();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let running = Arc::clone(&server);
        let task = tokio::spawn(async move {
            running.serve(listener, Arc::new(sink), shutdown_rx).await
        });

        assert_greets(addr).await;
        shutdown_tx.send(()).await.unwrap();
        task.await.unwrap().unwrap();
    }
}
