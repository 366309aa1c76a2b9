//! Metric helpers for `wireline`.
//!
//! Names and thin wrappers around the [`metrics`](https://docs.rs/metrics)
//! crate. With the `metrics` feature disabled every helper compiles to a
//! no-op so call sites stay unconditional.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open connections.
pub const CONNECTIONS_ACTIVE: &str = "wireline_connections_active";
/// Name of the counter tracking complete messages.
pub const MESSAGES_TOTAL: &str = "wireline_messages_total";
/// Name of the counter tracking connection-scoped errors.
pub const ERRORS_TOTAL: &str = "wireline_errors_total";
/// Name of the counter tracking handler panics.
pub const CONNECTION_PANICS: &str = "wireline_connection_panics_total";
/// Name of the counter tracking refused upgrades.
pub const UPGRADES_REJECTED: &str = "wireline_upgrades_rejected_total";

/// Direction of message flow.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Messages dispatched to handlers.
    Inbound,
    /// Messages written through the send queue.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code, reason = "only used by metric labels"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the open connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a complete message in the given direction.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a connection-scoped error.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

/// Record a panic caught from a connection task.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}

/// Record an upgrade refused before reaching `Open`.
pub fn inc_upgrades_rejected() {
    #[cfg(feature = "metrics")]
    counter!(UPGRADES_REJECTED).increment(1);
}
