//! Ordered record of callback activity shared between hooks and assertions.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::Notify;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Append-only list of strings that tests can wait on.
///
/// Clones share the same entries, so one clone can be moved into hook
/// closures while the test keeps another.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    changed: Arc<Notify>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an entry and wake any waiter.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
        self.changed.notify_waiters();
    }

    /// Snapshot of every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until `pred` holds for the entries, returning the snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the condition does not hold within five seconds.
    pub async fn wait_until<F>(&self, mut pred: F) -> Vec<String>
    where
        F: FnMut(&[String]) -> bool,
    {
        let waiting = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                let snapshot = self.entries();
                if pred(&snapshot) {
                    return snapshot;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(WAIT_LIMIT, waiting).await {
            Ok(snapshot) => snapshot,
            Err(_) => panic!("journal condition not met; entries: {:?}", self.entries()),
        }
    }

    /// Wait until at least `count` entries were recorded.
    pub async fn wait_for_len(&self, count: usize) -> Vec<String> {
        self.wait_until(|entries| entries.len() >= count).await
    }

    /// Wait until `entry` was recorded.
    pub async fn wait_for(&self, entry: &str) -> Vec<String> {
        self.wait_until(|entries| entries.iter().any(|e| e == entry)).await
    }
}
