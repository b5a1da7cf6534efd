//! # Configuration Management
//!
//! Centralized configuration for the Votifier server.
//!
//! The host supplies the listen port, where the token file lives, whether an
//! implicit "default" platform is provisioned and used as fallback, and the
//! initial list of platforms to provision.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - The 5 second connection timeout bounds how long an idle peer can hold a socket
//! - The frame size cap bounds per-connection memory

use crate::error::{Result, VotifierError};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default Votifier listen port
pub const DEFAULT_PORT: u16 = 8192;

/// Default token file name, relative to the working directory
pub const DEFAULT_TOKEN_FILE: &str = "NuVotifier2.json";

/// Largest first chunk read from a connection
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Upper bound accepted for `max_connections`
pub const MAX_CONNECTIONS: usize = 1_000_000;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VotifierConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token store configuration
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VotifierConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| VotifierError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| VotifierError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| VotifierError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `VOTIFIER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("VOTIFIER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(port) = std::env::var("VOTIFIER_PORT") {
            self.server.port = port
                .parse::<u16>()
                .map_err(|e| VotifierError::ConfigError(format!("Invalid VOTIFIER_PORT: {e}")))?;
        }

        if let Ok(timeout) = std::env::var("VOTIFIER_CONNECTION_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                VotifierError::ConfigError(format!("Invalid VOTIFIER_CONNECTION_TIMEOUT_MS: {e}"))
            })?;
            self.server.connection_timeout = Duration::from_millis(millis);
        }

        if let Ok(path) = std::env::var("VOTIFIER_TOKEN_FILE") {
            self.tokens.token_file = PathBuf::from(path);
        }

        if let Ok(flag) = std::env::var("VOTIFIER_USE_DEFAULT_TOKEN") {
            self.tokens.use_default_token = flag.parse::<bool>().map_err(|e| {
                VotifierError::ConfigError(format!("Invalid VOTIFIER_USE_DEFAULT_TOKEN: {e}"))
            })?;
        }

        if let Ok(platforms) = std::env::var("VOTIFIER_PLATFORMS") {
            self.tokens.platforms = platforms
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VotifierError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| VotifierError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.tokens.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(VotifierError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    pub bind_address: String,

    /// TCP port to listen on
    pub port: u16,

    /// Idle timeout per connection, measured from acceptance
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Size of the buffer the first data chunk is read into
    pub max_frame_size: usize,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: DEFAULT_PORT,
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Resolve `bind_address` and `port` into a socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self.bind_address.parse::<IpAddr>().map_err(|e| {
            VotifierError::ConfigError(format!(
                "Invalid bind address '{}': {e}",
                self.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.socket_addr().is_err() {
            errors.push(format!(
                "Invalid bind address format: '{}' (expected an IP such as '0.0.0.0')",
                self.bind_address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        // A frame needs at least the magic plus a minimal envelope
        if self.max_frame_size < 64 {
            errors.push("Max frame size too small (minimum: 64 bytes)".to_string());
        } else if self.max_frame_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 16 MB)",
                self.max_frame_size
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > MAX_CONNECTIONS {
            errors.push(format!(
                "Max connections too large: {} (maximum: {})",
                self.max_connections, MAX_CONNECTIONS
            ));
        }

        errors
    }
}

/// Token store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Location of the persisted token file, created on first run
    pub token_file: PathBuf,

    /// Provision a "default" platform and use it for unknown services
    pub use_default_token: bool,

    /// Platforms to provision on startup
    pub platforms: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            use_default_token: true,
            platforms: Vec::new(),
        }
    }
}

impl TokenConfig {
    /// Validate token configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.token_file.as_os_str().is_empty() {
            errors.push("Token file path cannot be empty".to_string());
        }

        if self.platforms.iter().any(|p| p.trim().is_empty()) {
            errors.push("Platform names cannot be empty".to_string());
        }

        if !self.use_default_token && self.platforms.is_empty() && !self.token_file.exists() {
            errors.push(
                "No platforms configured and default token disabled: the token store would be empty"
                    .to_string(),
            );
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level, overridden by `RUST_LOG` when set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to emit ANSI colours
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("votifier"),
            log_level: Level::INFO,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
