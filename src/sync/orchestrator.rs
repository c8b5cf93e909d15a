//! The fetch orchestrator: decides per call whether to trust the cache or
//! run a full fetch-and-reconcile cycle, and reports progress as snapshots.
//!
//! Each invocation runs in its own spawned task and emits over an mpsc
//! channel, so a subscriber that walks away (drops its receiver) never
//! cancels a cycle that already acquired the single-flight lock - the cycle
//! runs to completion to leave the cache consistent, and late snapshots are
//! simply dropped.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::key::CacheKey;
use crate::store::StoreError;
use crate::sync::flight::SingleFlightGuard;
use crate::sync::staleness::RefreshTracker;
use crate::sync::{ResourceSnapshot, SyncError};

/// Snapshot channel depth. A cycle emits at most four snapshots.
const SNAPSHOT_CHANNEL_SIZE: usize = 8;

/// A live, re-emitting read of the local cache for one key.
pub type LocalQuery<T> =
    Box<dyn Fn() -> Result<BoxStream<'static, T>, SyncError> + Send + Sync>;

/// Everything a domain repository supplies for one orchestrated call.
///
/// `T` is the locally cached aggregate, `R` the raw remote result. The
/// `fetch` future is lazy and polled at most once, after the second
/// staleness check under the lock.
pub struct ResourceRequest<T, R> {
    pub cache_key: CacheKey,
    /// Live local read; invoked for the initial read and for the re-reads
    /// under and after the lock.
    pub query_local: LocalQuery<T>,
    /// Domain-specific emptiness test, e.g. "lesson list empty".
    pub is_result_empty: Box<dyn Fn(&T) -> bool + Send>,
    /// Combines forced refresh, staleness and emptiness. Evaluated against
    /// the first local read, then re-evaluated under the lock.
    pub should_fetch: Box<dyn Fn(&T) -> bool + Send>,
    /// The remote call. May fail; never retried here.
    pub fetch: BoxFuture<'static, Result<R, SyncError>>,
    /// Persists the reconciled state (diff + apply) and performs side
    /// effects keyed off the diff only.
    pub save_fetch_result: Box<dyn FnOnce(T, R) -> BoxFuture<'static, Result<(), SyncError>> + Send>,
    /// Final shaping applied before delivery, e.g. narrowing to a requested
    /// date window.
    pub filter_result: Box<dyn Fn(T) -> T + Send>,
}

/// Shared engine state: the per-key locks and the refresh records.
///
/// One engine instance serves every repository of a session, so concurrent
/// callers for the same key contend on the same lock.
pub struct SyncEngine {
    guard: Arc<SingleFlightGuard>,
    tracker: Arc<RefreshTracker>,
}

impl SyncEngine {
    pub fn new(tracker: Arc<RefreshTracker>) -> Self {
        Self {
            guard: Arc::new(SingleFlightGuard::new()),
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<RefreshTracker> {
        &self.tracker
    }

    /// Run one orchestrated call, delivering snapshots to the returned
    /// receiver: at most one `Loading`, at most one `Intermediate`, exactly
    /// one terminal `Success`/`Error`, then the channel closes.
    pub fn resource<T, R>(&self, request: ResourceRequest<T, R>) -> mpsc::Receiver<ResourceSnapshot<T>>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_SIZE);
        let guard = Arc::clone(&self.guard);
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            Self::run_cycle(guard, tracker, request, tx).await;
        });
        rx
    }

    async fn run_cycle<T, R>(
        guard: Arc<SingleFlightGuard>,
        tracker: Arc<RefreshTracker>,
        request: ResourceRequest<T, R>,
        tx: mpsc::Sender<ResourceSnapshot<T>>,
    ) where
        T: Clone + Send + 'static,
        R: Send + 'static,
    {
        let key = request.cache_key.clone();
        Self::emit(&tx, ResourceSnapshot::Loading).await;

        let first = match Self::first_local(&request.query_local).await {
            Ok(value) => value,
            Err(err) => {
                error!(key = %key, error = %err, "Initial local read failed");
                Self::emit(&tx, ResourceSnapshot::Error(err)).await;
                return;
            }
        };

        if !(request.should_fetch)(&first) {
            debug!(key = %key, "Cache fresh, skipping fetch");
            Self::emit(&tx, ResourceSnapshot::Success((request.filter_result)(first))).await;
            return;
        }

        // Stale-but-usable data goes out before the network round trip.
        if !(request.is_result_empty)(&first) {
            Self::emit(
                &tx,
                ResourceSnapshot::Intermediate((request.filter_result)(first.clone())),
            )
            .await;
        }

        let lock = guard.acquire(&key).await;

        // A concurrent refresh may have completed while we waited.
        let current = match Self::first_local(&request.query_local).await {
            Ok(value) => value,
            Err(err) => {
                drop(lock);
                error!(key = %key, error = %err, "Local re-read under lock failed");
                Self::emit(&tx, ResourceSnapshot::Error(err)).await;
                return;
            }
        };
        if !(request.should_fetch)(&current) {
            drop(lock);
            debug!(key = %key, "Refreshed while waiting for lock, skipping fetch");
            Self::emit(&tx, ResourceSnapshot::Success((request.filter_result)(current))).await;
            return;
        }

        let remote = match request.fetch.await {
            Ok(remote) => remote,
            Err(err) => {
                drop(lock);
                error!(key = %key, error = %err, "Remote fetch failed");
                Self::emit(&tx, ResourceSnapshot::Error(err)).await;
                return;
            }
        };

        if let Err(err) = (request.save_fetch_result)(current, remote).await {
            drop(lock);
            error!(key = %key, error = %err, "Persisting fetch result failed");
            Self::emit(&tx, ResourceSnapshot::Error(err)).await;
            return;
        }

        // Freshness is about having checked, so even a no-op reconciliation
        // lands here. The record is skipped only on failed or skipped fetches.
        if let Err(err) = tracker.update_last_refresh(&key) {
            warn!(key = %key, error = %err, "Failed to persist refresh record");
        }

        drop(lock);

        let refreshed = match Self::first_local(&request.query_local).await {
            Ok(value) => value,
            Err(err) => {
                error!(key = %key, error = %err, "Local read after save failed");
                Self::emit(&tx, ResourceSnapshot::Error(err)).await;
                return;
            }
        };
        debug!(key = %key, "Refresh cycle complete");
        Self::emit(&tx, ResourceSnapshot::Success((request.filter_result)(refreshed))).await;
    }

    async fn first_local<T>(query: &LocalQuery<T>) -> Result<T, SyncError> {
        let mut stream = query()?;
        stream
            .next()
            .await
            .ok_or(SyncError::LocalStore(StoreError::Closed))
    }

    async fn emit<T>(tx: &mpsc::Sender<ResourceSnapshot<T>>, snapshot: ResourceSnapshot<T>) {
        if tx.send(snapshot).await.is_err() {
            debug!("Subscriber gone, dropping snapshot");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
