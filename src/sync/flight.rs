//! Per-key mutual exclusion for fetch-and-reconcile cycles.
//!
//! Logically one mutex per resource instance, not a single global lock.
//! Entries are created lazily and never removed - removal would race with a
//! waiter that already cloned the entry. A second concurrent caller for the
//! same key blocks here and re-checks staleness after acquiring, which
//! collapses bursts of near-simultaneous calls into one network round trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use crate::key::CacheKey;

#[derive(Default)]
pub struct SingleFlightGuard {
    locks: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl SingleFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, suspending until available.
    ///
    /// The returned guard owns its mutex, so it can cross await points and
    /// outlive the map borrow.
    pub async fn acquire(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("single-flight lock map poisoned");
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        trace!(key = %key, "Waiting for single-flight lock");
        let guard = lock.lock_owned().await;
        trace!(key = %key, "Single-flight lock acquired");
        guard
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let guard = Arc::new(SingleFlightGuard::new());
        let key = CacheKey::new(ResourceKind::Grades, "1");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let guard = Arc::clone(&guard);
            let key = key.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _lock = guard.acquire(&key).await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let guard = SingleFlightGuard::new();
        let a = CacheKey::new(ResourceKind::Grades, "1");
        let b = CacheKey::new(ResourceKind::Grades, "2");

        let _lock_a = guard.acquire(&a).await;
        // Must not deadlock: key "2" has its own mutex.
        let _lock_b = guard.acquire(&b).await;
    }
}
