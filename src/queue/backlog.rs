//! Outstanding-operation accounting for the send queue.
//!
//! A [`Backlog`] is the only state mutated by several producers at once.
//! Reservation and release are lock-free so producers never contend with the
//! worker executing queued operations.

#[cfg(loom)]
use loom::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
#[cfg(not(loom))]
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Shared count of queued-but-unfinished operations with an optional ceiling.
#[derive(Clone, Debug)]
pub struct Backlog {
    count: Arc<AtomicUsize>,
    limit: Option<usize>,
}

impl Backlog {
    /// Create an empty backlog. `None` means unbounded.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Reserve a slot, failing when the ceiling has been reached.
    ///
    /// The returned [`BacklogSlot`] releases the reservation when dropped, so
    /// the count shrinks whether the operation succeeds, fails or is
    /// discarded without running.
    #[must_use]
    pub fn try_reserve(&self) -> Option<BacklogSlot> {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if self.limit.is_some_and(|limit| current >= limit) {
                return None;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(BacklogSlot {
                        count: Arc::clone(&self.count),
                    });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Current number of outstanding operations.
    #[must_use]
    pub fn len(&self) -> usize { self.count.load(Ordering::Acquire) }

    /// Returns `true` when nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Configured ceiling.
    #[must_use]
    pub fn limit(&self) -> Option<usize> { self.limit }
}

/// A reserved backlog slot, released on drop.
#[derive(Debug)]
pub struct BacklogSlot {
    count: Arc<AtomicUsize>,
}

impl Drop for BacklogSlot {
    fn drop(&mut self) { self.count.fetch_sub(1, Ordering::AcqRel); }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::Backlog;

    #[test]
    fn reservations_stop_at_the_limit() {
        let backlog = Backlog::new(Some(2));
        let first = backlog.try_reserve();
        let second = backlog.try_reserve();
        assert!(first.is_some() && second.is_some());
        assert!(backlog.try_reserve().is_none());
        assert_eq!(backlog.len(), 2);

        drop(first);
        assert_eq!(backlog.len(), 1);
        assert!(backlog.try_reserve().is_some());
    }

    #[test]
    fn unbounded_backlog_still_counts() {
        let backlog = Backlog::new(None);
        let slots: Vec<_> = (0..16).filter_map(|_| backlog.try_reserve()).collect();
        assert_eq!(backlog.len(), 16);
        drop(slots);
        assert!(backlog.is_empty());
    }
}
