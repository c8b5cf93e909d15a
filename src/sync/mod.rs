//! The network-bound resource synchronization engine.
//!
//! The pieces, composed by [`SyncEngine::resource`]:
//!
//! - [`ResourceSnapshot`]: the per-call state sequence delivered to callers
//! - [`RefreshTracker`]: persisted last-refresh instants and TTL checks
//! - [`reconcile`]: minimal identity diff between cached and remote data
//! - [`SingleFlightGuard`]: per-key mutual exclusion for refresh cycles
//! - [`SyncEngine`]: the read-cache-or-fetch-and-reconcile decision itself

pub mod error;
pub mod flight;
pub mod orchestrator;
pub mod reconcile;
pub mod snapshot;
pub mod staleness;

pub use error::SyncError;
pub use flight::SingleFlightGuard;
pub use orchestrator::{LocalQuery, ResourceRequest, SyncEngine};
pub use reconcile::{reconcile, unique_subtract, Identifiable, ReconciliationPlan};
pub use snapshot::{to_terminal, ResourceSnapshot};
pub use staleness::RefreshTracker;
