//! Process-wide count of running connection tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{metrics, session::ConnectionId};

static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);

/// Held by a connection task for its whole run, including teardown. Dropping
/// it, even while unwinding, releases the count.
pub(super) struct ActiveConnection {
    id: ConnectionId,
}

impl ActiveConnection {
    pub(super) fn enter(id: ConnectionId) -> Self {
        let active = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::inc_connections();
        debug!(%id, active, "connection task started");
        Self { id }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        let active = ACTIVE_CONNECTIONS
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        metrics::dec_connections();
        debug!(id = %self.id, active, "connection task finished");
    }
}

/// Number of connection tasks currently running in this process.
#[must_use]
pub fn active_connection_count() -> u64 { ACTIVE_CONNECTIONS.load(Ordering::Relaxed) }
