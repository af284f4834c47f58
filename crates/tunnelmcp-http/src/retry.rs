//! Reconnection backoff.

use std::time::Duration;

use tunnelmcp_transport_traits::ReconnectConfig;

/// Decides whether another reconnection attempt is allowed and how long to wait for it.
#[derive(Clone, Debug, Default)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
}

impl ReconnectPolicy {
    /// Creates a policy from configuration.
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config }
    }

    /// Returns `true` when failures and server directives should trigger reconnection.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the attempt number to use next, or `None` once `attempts_made` reached the limit.
    pub fn next_attempt(&self, attempts_made: u32) -> Option<u32> {
        (attempts_made < self.config.max_attempts).then(|| attempts_made + 1)
    }

    /// Delay before the 1-based `attempt`.
    ///
    /// `base * 2^(attempt - 1)`, where `base` is the server's `retry:` interval
    /// when it was received and honoring it is enabled. Capped by `max_delay`.
    pub fn delay(&self, attempt: u32, server_retry_ms: Option<u64>) -> Duration {
        let base = match server_retry_ms {
            Some(ms) if self.config.honor_server_retry => Duration::from_millis(ms),
            _ => self.config.base_delay,
        };
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = base.saturating_mul(factor);

        match self.config.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
