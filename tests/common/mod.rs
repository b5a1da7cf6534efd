//! Shared helpers for integration tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use votifier_protocol::config::ServerConfig;
use votifier_protocol::core::frame::encode_frame;
use votifier_protocol::protocol::handshake::parse_protocol_2_greeting;
use votifier_protocol::protocol::message::{Envelope, VotePayload, VoteTimestamp};
use votifier_protocol::service::events::{ErrorReceiver, VoteReceiver};
use votifier_protocol::{channel_sink, Challenge, Result, TokenStore, VotifierServer};

/// A server bound to an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: Arc<VotifierServer>,
    pub votes: VoteReceiver,
    pub errors: ErrorReceiver,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<Result<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let tokens = TokenStore::initialize(dir.path().join("NuVotifier2.json"), &["alpha"], true)
            .expect("token store");
        let config = ServerConfig {
            bind_address: "127.0.0.1".into(),
            port: 0,
            ..config
        };
        let server = Arc::new(VotifierServer::with_parts(
            config,
            tokens,
            Challenge::generate().expect("challenge"),
        ));

        let listener = server.bind().await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (sink, votes, errors) = channel_sink();
        let (shutdown, shutdown_rx) = mpsc::channel(1);

        let running = Arc::clone(&server);
        let handle =
            tokio::spawn(async move { running.serve(listener, Arc::new(sink), shutdown_rx).await });

        Self {
            addr,
            server,
            votes,
            errors,
            shutdown,
            handle,
            _dir: dir,
        }
    }

    pub fn key(&self, platform: &str) -> Vec<u8> {
        self.server
            .tokens()
            .get(platform)
            .expect("platform provisioned")
            .key()
            .to_vec()
    }

    pub async fn stop(self) {
        self.shutdown.send(()).await.expect("server running");
        self.handle.await.expect("join").expect("serve");
    }
}

/// Client side of one connection, past the greeting
pub struct Client {
    pub reader: BufReader<TcpStream>,
    pub legacy_greeting: String,
    pub challenge: Challenge,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut reader = BufReader::new(stream);

        let mut legacy_greeting = String::new();
        reader.read_line(&mut legacy_greeting).await.expect("legacy greeting");
        let mut v2 = String::new();
        reader.read_line(&mut v2).await.expect("v2 greeting");
        let challenge = parse_protocol_2_greeting(&v2).expect("v2 greeting format");

        Self {
            reader,
            legacy_greeting,
            challenge,
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.reader.get_mut().write_all(bytes).await.expect("write");
    }

    pub async fn send_vote(&mut self, service: &str, username: &str, key: &[u8]) {
        let challenge = self.challenge.to_string();
        let frame = signed_frame(service, username, &challenge, key);
        self.send(&frame).await;
    }

    /// Wait for the server to close the connection. Returns anything it sent first.
    pub async fn closed(mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.reader.read_to_end(&mut rest))
            .await
            .expect("server should close the connection");
        rest
    }
}

pub fn payload_json(service: &str, username: &str, challenge: &str) -> String {
    VotePayload {
        service_name: service.into(),
        username: username.into(),
        address: "203.0.113.9".into(),
        timestamp: VoteTimestamp::from(1_700_000_000_000u64),
        challenge: challenge.into(),
    }
    .to_json()
    .expect("payload json")
}

pub fn signed_frame(service: &str, username: &str, challenge: &str, key: &[u8]) -> Vec<u8> {
    let envelope = Envelope::signed(payload_json(service, username, challenge), key)
        .expect("sign")
        .to_json()
        .expect("envelope json");
    encode_frame(&envelope)
}
