//! # Configuration Management
//!
//! Centralized configuration for the server browser.
//!
//! This module holds the wire constants of the connless protocol and the
//! structured, serde-backed configuration for the retry engine, the
//! discovery fan-out, the UDP transport and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Tuning
//! The burst growth factors and the timeout floor are empirical values for
//! lossy links. The `[retry]` section overrides them.

use crate::error::{BrowserError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest datagram the browser reads
pub const MAX_BUFFER_SIZE: usize = 1400;

/// Full-size datagrams a burst may have in flight per socket
pub const MAX_CHUNKS: usize = 16;

/// Exact size of a token response: control header (7) + message id (1) + token (4)
pub const TOKEN_RESPONSE_SIZE: usize = 12;

/// Size of the connless header in front of every typed response:
/// flags (1) + token (4) + response token (4)
pub const TOKEN_PREFIX_SIZE: usize = 9;

/// Anything shorter cannot carry a header and is rejected outright
pub const MIN_HEADER_LENGTH: usize = TOKEN_PREFIX_SIZE;

/// Length of every request/response signature
pub const SIGNATURE_SIZE: usize = 8;

/// Smallest receive buffer that holds a typed response header, signature
/// and the two-byte server count
pub const MIN_BUFFER_SIZE: usize = TOKEN_PREFIX_SIZE + SIGNATURE_SIZE + 2;

/// Connless request/response signatures
pub const REQUEST_SERVER_LIST: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xffreq2";
pub const SEND_SERVER_LIST: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xfflis2";
pub const REQUEST_SERVER_COUNT: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xffcou2";
pub const SEND_SERVER_COUNT: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xffsiz2";
pub const REQUEST_INFO: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xffgie3";
pub const SEND_INFO: [u8; SIGNATURE_SIZE] = *b"\xff\xff\xff\xffinf3";

/// Default master servers
pub const MASTER_SERVERS: [&str; 4] = [
    "master1.teeworlds.com:8283",
    "master2.teeworlds.com:8283",
    "master3.teeworlds.com:8283",
    "master4.teeworlds.com:8283",
];

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BrowserConfig {
    /// Retry engine tuning
    #[serde(default)]
    pub retry: RetryConfig,

    /// Master servers and fan-out budgets
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Socket configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BrowserConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| BrowserError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| BrowserError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| BrowserError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(masters) = std::env::var("SERVER_BROWSER_MASTER_SERVERS") {
            config.discovery.master_servers = masters
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(timeout) = std::env::var("SERVER_BROWSER_MASTER_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.discovery.master_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("SERVER_BROWSER_SERVER_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.discovery.server_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("SERVER_BROWSER_MIN_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.retry.min_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(addr) = std::env::var("SERVER_BROWSER_BIND_ADDRESS") {
            config.transport.bind_address = addr;
        }

        Ok(config)
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
            .map_err(|e| BrowserError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| BrowserError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.retry.validate());
        errors.extend(self.discovery.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BrowserError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Retry engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Budget floor and first per-attempt read timeout
    #[serde(with = "duration_serde")]
    pub min_timeout: Duration,

    /// Burst multiplier per attempt during the token exchange
    pub token_burst_growth: f64,

    /// Burst multiplier per attempt during the typed exchange
    pub request_burst_growth: f64,

    /// Upper bound on copies sent in one attempt
    pub max_burst: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_timeout: timeout::MIN_TIMEOUT,
            token_burst_growth: 1.2,
            request_burst_growth: 2.0,
            max_burst: 1024,
        }
    }
}

impl RetryConfig {
    /// Validate retry configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.min_timeout.is_zero() {
            errors.push("Minimum timeout must be greater than 0".to_string());
        } else if self.min_timeout.as_secs() > 10 {
            errors.push("Minimum timeout too long (maximum: 10s)".to_string());
        }

        if !self.token_burst_growth.is_finite() || self.token_burst_growth < 1.0 {
            errors.push(format!(
                "Token burst growth must be at least 1.0, got {}",
                self.token_burst_growth
            ));
        }

        if !self.request_burst_growth.is_finite() || self.request_burst_growth < 1.0 {
            errors.push(format!(
                "Request burst growth must be at least 1.0, got {}",
                self.request_burst_growth
            ));
        }

        if self.max_burst == 0 {
            errors.push("Max burst must be greater than 0".to_string());
        }

        errors
    }
}

/// Master-server table and fan-out budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Master servers as `host:port`
    pub master_servers: Vec<String>,

    /// Budget for each master-server exchange
    #[serde(with = "duration_serde")]
    pub master_timeout: Duration,

    /// Budget for each game-server exchange
    #[serde(with = "duration_serde")]
    pub server_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            master_servers: MASTER_SERVERS.iter().map(|s| s.to_string()).collect(),
            master_timeout: timeout::TIMEOUT_MASTER_SERVERS,
            server_timeout: timeout::TIMEOUT_SERVERS,
        }
    }
}

impl DiscoveryConfig {
    /// Validate discovery configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.master_servers.is_empty() {
            errors.push("At least one master server must be configured".to_string());
        }

        for master in &self.master_servers {
            match master.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
                _ => errors.push(format!(
                    "Invalid master server address: '{master}' (expected format: 'host:port')"
                )),
            }
        }

        if self.master_timeout.is_zero() {
            errors.push("Master timeout must be greater than 0".to_string());
        }

        if self.server_timeout.is_zero() {
            errors.push("Server timeout must be greater than 0".to_string());
        }

        errors
    }
}

/// Socket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Largest datagram read from a peer
    pub max_buffer_size: usize,

    /// Local address each exchange binds its socket to
    pub bind_address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: MAX_BUFFER_SIZE,
            bind_address: String::from("0.0.0.0:0"),
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_buffer_size < MIN_BUFFER_SIZE {
            errors.push(format!(
                "Max buffer size too small: {} (minimum: {MIN_BUFFER_SIZE})",
                self.max_buffer_size
            ));
        } else if self.max_buffer_size > 65_507 {
            errors.push(format!(
                "Max buffer size too large: {} (maximum UDP payload: 65507)",
                self.max_buffer_size
            ));
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address format: '{}' (expected format: '0.0.0.0:0')",
                self.bind_address
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("server-browser"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
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
        let millis = duration.as_millis() as u64;
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
