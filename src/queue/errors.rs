//! Error type resolved by [`super::SendHandle`].

use std::io;

use thiserror::Error;

/// Why a queued send did not complete successfully.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SendError {
    /// The queue already held its maximum number of outstanding sends.
    #[error("send queue backlog limit of {limit} reached")]
    Backlog {
        /// Configured maximum depth.
        limit: usize,
    },
    /// The connection is not open, so nothing was queued.
    #[error("connection is not open")]
    Closed,
    /// The underlying transport write failed.
    #[error("transport write failed: {0}")]
    Write(#[source] io::Error),
    /// The queued operation panicked.
    #[error("queued send panicked: {0}")]
    Panicked(String),
    /// The queue worker stopped before the operation ran.
    #[error("send queue stopped before the operation ran")]
    Abandoned,
}

impl SendError {
    /// Returns `true` when the send was refused without touching the
    /// transport, so retrying later may succeed.
    #[must_use]
    pub fn is_backpressure(&self) -> bool { matches!(self, Self::Backlog { .. }) }
}
