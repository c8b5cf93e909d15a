//! Last-refresh bookkeeping per cache key.
//!
//! One JSON file holds the full key -> instant map. A record is created on
//! the first successful fetch and overwritten on every subsequent one; the
//! orchestrator never updates it after a skipped or failed fetch. Freshness
//! is about *having checked*, so a refresh that changed nothing still
//! updates its record.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// File holding all refresh records, kept next to the cached collections.
const REFRESH_FILE: &str = "last_refresh.json";

pub struct RefreshTracker {
    path: PathBuf,
    records: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RefreshTracker {
    /// Open the tracker in `dir`, loading any persisted records.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create refresh record directory: {}", dir.display()))?;
        let path = dir.join(REFRESH_FILE);

        let records = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read refresh records: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse refresh records: {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// True if the key has never been refreshed or its record is older than
    /// `ttl`. The TTL is supplied by the caller per resource kind; the
    /// tracker assumes no default.
    pub fn should_be_refreshed(&self, key: &crate::key::CacheKey, ttl: Duration) -> bool {
        let records = self.records.lock().expect("refresh record lock poisoned");
        match records.get(&key.to_string()) {
            Some(last) => {
                let expired = Utc::now() - *last > ttl;
                if expired {
                    debug!(key = %key, last = %last, "Refresh record expired");
                }
                expired
            }
            None => true,
        }
    }

    /// Record a successful fetch+reconcile for `key` at now.
    pub fn update_last_refresh(&self, key: &crate::key::CacheKey) -> Result<()> {
        self.record(key, Utc::now())
    }

    /// Last successful refresh instant, for display ("last updated at ...").
    pub fn last_refresh(&self, key: &crate::key::CacheKey) -> Option<DateTime<Utc>> {
        let records = self.records.lock().expect("refresh record lock poisoned");
        records.get(&key.to_string()).copied()
    }

    pub(crate) fn record(&self, key: &crate::key::CacheKey, at: DateTime<Utc>) -> Result<()> {
        // The lock is held across the write so two concurrent records can
        // never persist their file snapshots out of order.
        let mut records = self.records.lock().expect("refresh record lock poisoned");
        records.insert(key.to_string(), at);

        let contents = serde_json::to_string_pretty(&*records)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write refresh records: {}", self.path.display()))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
