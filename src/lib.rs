//! Gradecache - cache-first synchronization for an e-register client.
//!
//! The crate mirrors data owned by a remote institutional record system
//! (grades, timetables, messages, ...) into a local persistent cache so the
//! user sees data instantly and offline, while the engine opportunistically
//! refreshes from the remote source of truth. The remote is always
//! authoritative; this is a single-device client, not a distributed
//! database.
//!
//! The moving parts:
//!
//! - [`sync::SyncEngine`] decides per call whether to trust the cache or
//!   run a fetch-and-reconcile cycle, reporting progress as
//!   [`sync::ResourceSnapshot`]s
//! - [`sync::RefreshTracker`] persists last-refresh instants and answers
//!   TTL checks
//! - [`sync::reconcile`] computes the minimal add/remove plan by item
//!   identity
//! - [`sync::SingleFlightGuard`] collapses concurrent refreshes of one key
//!   into a single network round trip
//! - [`store::CollectionStore`] holds the cached collections and pushes
//!   live updates to observers
//! - [`repos`] contains the domain repositories wiring it all together

pub mod config;
pub mod key;
pub mod models;
pub mod notify;
pub mod remote;
pub mod repos;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use key::{CacheKey, ResourceKind};
pub use store::CollectionStore;
pub use sync::{
    reconcile, Identifiable, ReconciliationPlan, RefreshTracker, ResourceRequest,
    ResourceSnapshot, SyncEngine, SyncError,
};
