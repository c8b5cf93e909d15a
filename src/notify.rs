//! Notification scheduling seam.
//!
//! Push/alarm delivery is out of scope; repositories only promise to call
//! this seam with the *diffed* items (additions and removals), never the
//! full dataset, so an unchanged collection can never re-notify on refresh.

use tracing::debug;

pub trait NotificationScheduler<T>: Send + Sync {
    /// Items newly added by a reconciliation.
    fn schedule(&self, added: &[T]);

    /// Items removed by a reconciliation whose pending notifications should
    /// be withdrawn.
    fn cancel(&self, removed: &[T]);
}

/// Scheduler used when the caller did not wire a real one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl<T> NotificationScheduler<T> for NoopScheduler {
    fn schedule(&self, added: &[T]) {
        if !added.is_empty() {
            debug!(count = added.len(), "No scheduler wired, skipping notifications");
        }
    }

    fn cancel(&self, _removed: &[T]) {}
}
