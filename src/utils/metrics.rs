//! Observability and Metrics
//!
//! Per-server counters for connections and request outcomes.
//!
//! Uses atomic counters for thread-safe metrics collection.

use crate::error::VotifierError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for a server instance
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Connections dropped because the connection limit was reached
    pub connections_refused: AtomicU64,
    /// Votes that passed verification
    pub votes_accepted: AtomicU64,
    /// Requests rejected by framing, parsing, challenge, token or signature checks
    pub votes_rejected: AtomicU64,
    /// Connections that hit the idle timeout
    pub timeouts: AtomicU64,
    /// Greeting, socket and other non-protocol failures
    pub connection_errors: AtomicU64,
    /// Bytes read from clients
    pub bytes_received: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_refused: AtomicU64::new(0),
            votes_accepted: AtomicU64::new(0),
            votes_rejected: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a connection refused at the limit
    pub fn connection_refused(&self) {
        self.connections_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame read from a client
    pub fn frame_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record an accepted vote
    pub fn vote_accepted(&self) {
        self.votes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed connection, classified by error
    pub fn failure(&self, error: &VotifierError) {
        let counter = match error {
            VotifierError::SocketTimeout => &self.timeouts,
            e if e.is_rejection() => &self.votes_rejected,
            _ => &self.connection_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of connections currently being handled
    pub fn active(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_refused: self.connections_refused.load(Ordering::Relaxed),
            votes_accepted: self.votes_accepted.load(Ordering::Relaxed),
            votes_rejected: self.votes_rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connections_refused = snapshot.connections_refused,
            votes_accepted = snapshot.votes_accepted,
            votes_rejected = snapshot.votes_rejected,
            timeouts = snapshot.timeouts,
            connection_errors = snapshot.connection_errors,
            bytes_received = snapshot.bytes_received,
            uptime_seconds = snapshot.uptime_seconds,
            "Votifier metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_refused: u64,
    pub votes_accepted: u64,
    pub votes_rejected: u64,
    pub timeouts: u64,
    pub connection_errors: u64,
    pub bytes_received: u64,
    pub uptime_seconds: u64,
}
