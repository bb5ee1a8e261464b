//! Configuration loading for xfer-client.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so an
//! empty file is a valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use xferlink_core::{ResetPolicy, DEFAULT_MESSAGE_LOG_CAPACITY};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// WebSocket address of the transfer server (`ws://` or `wss://`).
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// How long a command waits for its acknowledgment (default: 5000).
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// How long a connection attempt may take (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// What happens to device records on disconnect.
    #[serde(default)]
    pub reset_policy: ResetPolicy,
    /// Free-text messages kept in the snapshot (default: 50).
    #[serde(default = "default_message_log_capacity")]
    pub message_log_capacity: usize,
    /// Inbound events buffered ahead of the event loop (default: 256).
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

// Default value functions
fn default_server_url() -> String {
    "ws://127.0.0.1:1337".to_string()
}

fn default_ack_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_message_log_capacity() -> usize {
    DEFAULT_MESSAGE_LOG_CAPACITY
}

fn default_event_queue_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            ack_timeout_ms: default_ack_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reset_policy: ResetPolicy::default(),
            message_log_capacity: default_message_log_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the given server address.
    pub fn new(server_url: &str) -> Result<Self, ConfigError> {
        let config = Self {
            server_url: server_url.to_string(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds invalid
    /// values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: self.server_url.clone(),
                reason: format!("unsupported scheme '{}', expected ws or wss", url.scheme()),
            });
        }
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ack_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_queue_capacity",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Acknowledgment timeout.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Connection attempt timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Set the acknowledgment timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_ms = whole_millis(timeout);
        self
    }

    /// Set the connection attempt timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = whole_millis(timeout);
        self
    }

    /// Set the disconnect reset policy.
    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Set how many free-text messages to keep.
    pub fn with_message_log_capacity(mut self, capacity: usize) -> Self {
        self.message_log_capacity = capacity;
        self
    }

    /// Set the event queue capacity.
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}

/// Milliseconds for a timeout setter; never zero, saturating at `u64::MAX`.
fn whole_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// `server_url` is not a usable WebSocket address.
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl {
        /// The configured value.
        url: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A numeric field is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ack_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.reset_policy, ResetPolicy::OnNextDetect);
        assert_eq!(config.message_log_capacity, 50);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
server_url = "wss://transfer.local:8443/socket"
ack_timeout_ms = 2500
reset_policy = "on_disconnect"
message_log_capacity = 10
"#;

        let config = ClientConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.server_url, "wss://transfer.local:8443/socket");
        assert_eq!(config.ack_timeout(), Duration::from_millis(2500));
        assert_eq!(config.reset_policy, ResetPolicy::OnDisconnect);
        assert_eq!(config.message_log_capacity, 10);
        assert_eq!(config.event_queue_capacity, 256);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn http_scheme_is_rejected() {
        let err = ClientConfig::new("http://192.168.0.10:1337").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn garbage_url_is_rejected() {
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::from_toml_str("ack_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "ack_timeout_ms", .. }));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = ClientConfig::from_toml_str(r#"reset_policy = "never""#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"server_url = "ws://10.0.0.2:1337""#).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.server_url, "ws://10.0.0.2:1337");
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn builder_setters() {
        let config = ClientConfig::default()
            .with_ack_timeout(Duration::from_millis(750))
            .with_connect_timeout(Duration::from_secs(2))
            .with_reset_policy(ResetPolicy::OnDisconnect)
            .with_message_log_capacity(5)
            .with_event_queue_capacity(8);

        assert_eq!(config.ack_timeout_ms, 750);
        assert_eq!(config.connect_timeout_ms, 2000);
        assert_eq!(config.reset_policy, ResetPolicy::OnDisconnect);
        assert_eq!(config.message_log_capacity, 5);
        assert_eq!(config.event_queue_capacity, 8);
    }

    #[test]
    fn sub_millisecond_timeouts_round_up() {
        let config = ClientConfig::default()
            .with_ack_timeout(Duration::from_micros(500))
            .with_connect_timeout(Duration::ZERO);

        assert_eq!(config.ack_timeout(), Duration::from_millis(1));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }
}
