//! Per-connection configuration.
//!
//! [`ConnectionConfig`] is passed to an [`crate::endpoint::Endpoint`] and
//! copied into every connection it accepts. Values are immutable for the
//! lifetime of a connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound for a single reassembled message, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default time teardown waits for queued sends to finish.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned when validating a [`ConnectionConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The maximum message size was zero.
    #[error("invalid max message size {0}; must be >= 1")]
    InvalidMessageSize(usize),
    /// A send queue bound of zero would reject every send.
    #[error("invalid send queue depth {0}; must be >= 1 or unbounded")]
    InvalidQueueDepth(usize),
}

/// Limits applied to each connection.
///
/// ```
/// use wireline::config::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .max_message_size(1024)
///     .max_send_queue_depth(Some(32));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    max_message_size: usize,
    max_send_queue_depth: Option<usize>,
    #[serde(with = "duration_millis")]
    drain_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_send_queue_depth: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Set the largest reassembled message the receive loop accepts.
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Bound the number of outstanding sends. `None` leaves the queue
    /// unbounded.
    #[must_use]
    pub fn max_send_queue_depth(mut self, depth: Option<usize>) -> Self {
        self.max_send_queue_depth = depth;
        self
    }

    /// Set how long teardown waits for already queued sends.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Configured message size limit in bytes.
    #[must_use]
    pub const fn message_size_limit(&self) -> usize { self.max_message_size }

    /// Configured send queue bound.
    #[must_use]
    pub const fn send_queue_limit(&self) -> Option<usize> { self.max_send_queue_depth }

    /// Configured drain timeout.
    #[must_use]
    pub const fn drain_wait(&self) -> Duration { self.drain_timeout }

    /// Check that the configuration can be used to run connections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMessageSize`] when the size limit is zero
    /// and [`ConfigError::InvalidQueueDepth`] when the queue bound is
    /// `Some(0)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidMessageSize(self.max_message_size));
        }
        if let Some(0) = self.max_send_queue_depth {
            return Err(ConfigError::InvalidQueueDepth(0));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ConnectionConfig::default();
        assert_eq!(config.message_size_limit(), 65_536);
        assert_eq!(config.send_queue_limit(), None);
        assert_eq!(config.drain_wait(), DEFAULT_DRAIN_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::zero_size(ConnectionConfig::default().max_message_size(0), ConfigError::InvalidMessageSize(0))]
    #[case::zero_depth(
        ConnectionConfig::default().max_send_queue_depth(Some(0)),
        ConfigError::InvalidQueueDepth(0)
    )]
    fn validate_rejects_unusable_limits(#[case] config: ConnectionConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"max_send_queue_depth": 16, "drain_timeout": 250}"#)
                .expect("config should deserialize");
        assert_eq!(config.message_size_limit(), DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.send_queue_limit(), Some(16));
        assert_eq!(config.drain_wait(), Duration::from_millis(250));
    }
}
