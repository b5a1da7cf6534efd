//! Timeout constants and deadline helpers.

use crate::error::{Result, VotifierError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Idle timeout for a single connection, measured from acceptance
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time the listener waits for active connections to drain on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval while draining connections
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Run `fut` until `deadline`, mapping expiry to [`VotifierError::SocketTimeout`].
pub async fn with_deadline<F, T>(deadline: Instant, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(VotifierError::SocketTimeout),
    }
}
