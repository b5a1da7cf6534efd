//! # Utility Modules
//!
//! Supporting utilities for logging, metrics and timing.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup driven by `LoggingConfig`
//! - **Metrics**: Thread-safe connection and vote counters
//! - **Timeout**: Connection deadlines and shutdown timing

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
