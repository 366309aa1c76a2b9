//! Connection lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle stage of a connection.
///
/// Stages only move forward: `Created → Open → Closing → Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// The socket has been handed over but not yet accepted.
    Created = 0,
    /// Accepted; messages flow in both directions.
    Open = 1,
    /// One side initiated the close handshake.
    Closing = 2,
    /// The handshake completed or was aborted; the connection is inert.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Atomically updated [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self { Self(AtomicU8::new(ConnectionState::Created as u8)) }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`, returning `false` if another transition won.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enter `Closing` from `Open`. Only the first caller succeeds.
    pub(crate) fn begin_closing(&self) -> bool {
        self.transition(ConnectionState::Open, ConnectionState::Closing)
    }

    pub(crate) fn finish(&self) { self.0.store(ConnectionState::Closed as u8, Ordering::Release); }
}
