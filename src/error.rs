//! Canonical error and result types for the crate.
//!
//! [`ConnectionError`] covers failures scoped to a single connection and is
//! what handlers observe through their error callback. [`AcceptError`]
//! describes why an upgrade never produced an open connection.

use std::io;

use thiserror::Error;

use crate::{config::ConfigError, message::CloseStatus};

/// Errors raised while a connection is running.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Accumulated fragments exceeded the configured message size.
    #[error("message too large: {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Bytes observed before the limit was hit.
        size: usize,
        /// Configured limit.
        max: usize,
    },
    /// A text message did not decode as UTF-8.
    #[error("text message is not valid UTF-8")]
    InvalidUtf8,
    /// The transport failed to read, write or close.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// The operation is not meaningful for this transport model.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The connection is no longer open.
    #[error("connection is not open")]
    NotOpen,
    /// A handler callback panicked.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

impl ConnectionError {
    /// Close status sent to the peer when this error ends the connection.
    #[must_use]
    pub fn close_status(&self) -> CloseStatus {
        match self {
            Self::MessageTooLarge { .. } => CloseStatus::MESSAGE_TOO_BIG,
            Self::InvalidUtf8 => CloseStatus::INVALID_PAYLOAD,
            Self::Unsupported(_) => CloseStatus::UNSUPPORTED_DATA,
            Self::Transport(_) | Self::NotOpen | Self::HandlerPanicked(_) => {
                CloseStatus::INTERNAL_ERROR
            }
        }
    }

    /// Returns `true` when the transport itself is broken and a close frame
    /// is unlikely to reach the peer.
    #[must_use]
    pub fn is_transport(&self) -> bool { matches!(self, Self::Transport(_)) }
}

/// Reasons an upgrade did not result in an open connection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AcceptError {
    /// An authentication predicate refused the request.
    #[error("upgrade refused: authentication failed")]
    Unauthorized,
    /// The host adapter failed to complete or refuse the upgrade.
    #[error("upgrade failed: {0}")]
    Upgrade(#[from] io::Error),
    /// The endpoint is shutting down and no longer accepts connections.
    #[error("endpoint is shutting down")]
    ShuttingDown,
    /// The endpoint configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias used by connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
