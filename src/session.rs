//! Connection ids and the registry handlers use to reach their peers.
//!
//! Entries are weak: a connection that finished teardown, or whose last
//! handle was dropped, disappears on the next lookup or listing.
use std::sync::Weak;

use bytes::Bytes;
use dashmap::DashMap;

use crate::{
    connection::{Connection, ConnectionShared},
    message::MessageKind,
    queue::SendHandle,
};

/// Identifier assigned to a connection by its endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Concurrent registry of connections keyed by [`ConnectionId`].
#[derive(Default)]
pub struct SessionRegistry(DashMap<ConnectionId, Weak<ConnectionShared>>);

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Retrieve the connection for `id` if it is still alive.
    pub fn get(&self, id: &ConnectionId) -> Option<Connection> {
        // The shard guard is released inside `and_then`, before `remove_if`
        // needs the same shard.
        let live = self.0.get(id).and_then(|entry| entry.upgrade());
        if live.is_none() {
            self.0.remove_if(id, |_, weak| weak.strong_count() == 0);
        }
        live.map(Connection::from_shared)
    }

    /// Insert a newly opened connection.
    pub fn insert(&self, connection: &Connection) {
        self.0.insert(connection.id(), connection.downgrade());
    }

    /// Remove a connection, typically on teardown.
    pub fn remove(&self, id: &ConnectionId) { self.0.remove(id); }

    /// Remove all stale weak references.
    pub fn prune(&self) { self.0.retain(|_, weak| weak.strong_count() > 0); }

    /// Number of entries, including any not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Prune stale entries, then collect the live connections ordered by id.
    #[must_use]
    pub fn active_connections(&self) -> Vec<Connection> {
        let mut live = Vec::with_capacity(self.0.len());
        self.0.retain(|_, weak| {
            if let Some(shared) = weak.upgrade() {
                live.push(Connection::from_shared(shared));
                true
            } else {
                false
            }
        });
        live.sort_by_key(Connection::id);
        live
    }

    /// Prune stale entries, then return the ids of the live connections in
    /// ascending order.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        let mut ids = Vec::with_capacity(self.0.len());
        self.0.retain(|id, weak| {
            if weak.strong_count() > 0 {
                ids.push(*id);
                true
            } else {
                false
            }
        });
        ids.sort_unstable();
        ids
    }

    /// Queue `text` on every available connection except `exclude`.
    ///
    /// Connections that are not open are skipped. The returned handles
    /// resolve as each individual send completes.
    pub fn broadcast_text(&self, text: &str, exclude: Option<ConnectionId>) -> Vec<SendHandle> {
        let payload = Bytes::copy_from_slice(text.as_bytes());
        self.active_connections()
            .into_iter()
            .filter(|conn| Some(conn.id()) != exclude && conn.is_available())
            .map(|conn| conn.send(payload.clone(), MessageKind::Text, true))
            .collect()
    }
}
