//! SSE client configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tunnelmcp_transport_traits::{
    LimitsConfig, ReconnectConfig, TimeoutConfig, TransportError, TransportResult,
};

/// Prefix for environment variable overrides, e.g. `TUNNELMCP__TIMEOUTS__CONNECT=5000`.
pub const ENV_PREFIX: &str = "TUNNELMCP";

/// SSE session transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseClientConfig {
    /// Overlay service to dial
    pub service: String,

    /// Path of the event stream on the service
    pub sse_path: String,

    /// Path messages are POSTed to; the session id is appended as a query parameter
    pub message_path: String,

    /// Extra headers sent with the stream request
    pub headers: HashMap<String, String>,

    /// Connect and request timeouts
    pub timeouts: TimeoutConfig,

    /// Automatic reconnection
    pub reconnect: ReconnectConfig,

    /// Size limits for outbound messages and inbound event payloads
    pub limits: LimitsConfig,

    /// Keep the last event id and server retry interval when a stream is torn down
    pub preserve_event_state: bool,
}

impl Default for SseClientConfig {
    fn default() -> Self {
        Self {
            service: String::new(),
            sse_path: "/sse".to_string(),
            message_path: "/message".to_string(),
            headers: HashMap::new(),
            timeouts: TimeoutConfig::default(),
            reconnect: ReconnectConfig::default(),
            limits: LimitsConfig::default(),
            preserve_event_state: true,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The loaded values are inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] TransportError),
}

impl SseClientConfig {
    /// Configuration for `service` with default paths and policies.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Set the event stream path.
    #[must_use]
    pub fn with_sse_path(mut self, path: impl Into<String>) -> Self {
        self.sse_path = path.into();
        self
    }

    /// Set the message path.
    #[must_use]
    pub fn with_message_path(mut self, path: impl Into<String>) -> Self {
        self.message_path = path.into();
        self
    }

    /// Add a header to the stream request.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Set the request timeout; `None` waits indefinitely.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeouts.request = timeout;
        self
    }

    /// Set the reconnection settings.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Choose whether the last event id and retry interval survive stream teardown.
    #[must_use]
    pub fn with_preserve_event_state(mut self, preserve: bool) -> Self {
        self.preserve_event_state = preserve;
        self
    }

    /// Checks that the configuration can be used to connect.
    pub fn validate(&self) -> TransportResult<()> {
        if self.service.trim().is_empty() {
            return Err(TransportError::ConfigurationError(
                "service name must not be empty".to_string(),
            ));
        }
        if self.timeouts.connect.is_zero() {
            return Err(TransportError::ConfigurationError(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        if self.timeouts.request.is_some_and(|t| t.is_zero()) {
            return Err(TransportError::ConfigurationError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables prefixed with `TUNNELMCP__` override file settings;
    /// nested keys are separated by `__`, e.g. `TUNNELMCP__RECONNECT__MAX_ATTEMPTS=10`.
    ///
    /// ```rust,no_run
    /// use tunnelmcp_http::SseClientConfig;
    ///
    /// let config = SseClientConfig::from_file("client.toml").expect("Failed to load config");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported extension,
    /// cannot be parsed or fails [`validate`](Self::validate).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let loaded = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = loaded.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
