use crate::config::media_constraints::MediaConstraints;
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff for signaling writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based, the first retry is 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub transport: TransportConfig,
    pub media: MediaConstraints,
    /// Wait before rebuilding a dropped connection.
    pub reconnect_delay_ms: u64,
    /// Rebuilds allowed before a link is marked failed.
    pub max_reconnect_attempts: u32,
    /// A link that is not connected after this long counts as failed.
    pub negotiation_timeout_ms: u64,
    pub publish_retry: RetryPolicy,
}

impl CallConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            media: MediaConstraints::default(),
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 1,
            negotiation_timeout_ms: 30_000,
            publish_retry: RetryPolicy::default(),
        }
    }
}
