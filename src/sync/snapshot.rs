//! Snapshot states delivered to a subscriber over the lifetime of one
//! orchestrated call.
//!
//! Every invocation yields an ordered sequence: at most one `Loading`, at
//! most one `Intermediate`, and exactly one terminal `Success` or `Error`,
//! after which the channel closes. A later change to the underlying store
//! starts a new invocation, never a continuation of the old one.

use crate::sync::SyncError;

#[derive(Debug)]
pub enum ResourceSnapshot<T> {
    /// No data delivered yet.
    Loading,
    /// Stale local data delivered while a refresh is in flight.
    Intermediate(T),
    /// Authoritative data - the refresh was skipped or completed.
    Success(T),
    /// Local or remote failure. Data the subscriber already received stays
    /// valid; the engine does not retroactively invalidate it.
    Error(SyncError),
}

impl<T> ResourceSnapshot<T> {
    /// The carried data, if any.
    pub fn data(&self) -> Option<&T> {
        match self {
            ResourceSnapshot::Intermediate(data) | ResourceSnapshot::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ResourceSnapshot::Intermediate(data) | ResourceSnapshot::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            ResourceSnapshot::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceSnapshot::Loading)
    }

    /// Terminal snapshots end the sequence; subscribers stop listening after
    /// receiving one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceSnapshot::Success(_) | ResourceSnapshot::Error(_))
    }
}

/// Drain a snapshot stream until its terminal snapshot.
///
/// Convenience for callers (and tests) that only care about the final state.
pub async fn to_terminal<T>(
    rx: &mut tokio::sync::mpsc::Receiver<ResourceSnapshot<T>>,
) -> Option<ResourceSnapshot<T>> {
    while let Some(snapshot) = rx.recv().await {
        if snapshot.is_terminal() {
            return Some(snapshot);
        }
    }
    None
}
