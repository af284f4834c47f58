//! Transport configuration types.
//!
//! Durations serialize as integer milliseconds so configuration files can
//! write `connect = 5000`.

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;

/// Configuration for request and response size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a single inbound event payload in bytes.
    /// `None` = unlimited
    pub max_response_size: Option<usize>,

    /// Maximum outbound message body size in bytes.
    /// `None` = unlimited
    pub max_request_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: Some(10 * 1024 * 1024), // 10MB
            max_request_size: Some(1024 * 1024),       // 1MB
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_response_size: None,
            max_request_size: None,
        }
    }

    /// Create a configuration with strict limits for untrusted servers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_response_size: Some(1024 * 1024), // 1MB
            max_request_size: Some(256 * 1024),   // 256KB
        }
    }
}

/// Configuration for connection and request timeouts.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on opening the stream plus completing the session handshake.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect: Duration,

    /// Bound on a single request awaiting its response.
    /// `None` = no timeout
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub request: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Some(Duration::from_secs(60)),
        }
    }
}

impl TimeoutConfig {
    /// Create a configuration with short timeouts for fast operations.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Some(Duration::from_secs(10)),
        }
    }
}

/// Automatic reconnection settings.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reconnect automatically when the stream errors, closes or the server asks for it.
    pub enabled: bool,

    /// Attempts allowed before giving up. The counter resets on every handshake.
    pub max_attempts: u32,

    /// Delay before the first attempt; doubles with every further attempt.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_delay: Duration,

    /// Upper bound on a single delay.
    /// `None` = uncapped
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub max_delay: Option<Duration>,

    /// Use the server's `retry:` interval as the base delay when one was received.
    pub honor_server_retry: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: None,
            honor_server_retry: false,
        }
    }
}

impl ReconnectConfig {
    /// Never reconnect automatically.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
