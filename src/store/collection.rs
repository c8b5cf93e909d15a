use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::key::CacheKey;
use crate::store::StoreError;
use crate::sync::{unique_subtract, Identifiable, ReconciliationPlan};

/// Keyed store of cached collections with live observation.
///
/// Collections load lazily from disk on first access and are written back on
/// every applied plan. A write made while the single-flight guard is held is
/// visible to the next `read_once`/`observe` emission before the guard
/// releases, because both go through the same in-memory entry.
pub struct CollectionStore<T> {
    dir: PathBuf,
    entries: Mutex<HashMap<CacheKey, watch::Sender<Vec<T>>>>,
}

impl<T> CollectionStore<T>
where
    T: Identifiable + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn file_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn load_from_disk(&self, key: &CacheKey) -> Result<Vec<T>, StoreError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// The watch sender for `key`, created (and seeded from disk) on first use.
    fn entry(&self, key: &CacheKey) -> Result<watch::Sender<Vec<T>>, StoreError> {
        let mut entries = self.entries.lock().expect("collection store lock poisoned");
        if let Some(tx) = entries.get(key) {
            return Ok(tx.clone());
        }
        let items = self.load_from_disk(key)?;
        let (tx, _rx) = watch::channel(items);
        entries.insert(key.clone(), tx.clone());
        Ok(tx)
    }

    /// Live read: yields the current collection immediately, then again on
    /// every subsequent write to this key.
    pub fn observe(&self, key: &CacheKey) -> Result<BoxStream<'static, Vec<T>>, StoreError> {
        let rx = self.entry(key)?.subscribe();
        let stream = stream::unfold((rx, true), |(mut rx, first)| async move {
            if first {
                let current = rx.borrow_and_update().clone();
                return Some((current, (rx, false)));
            }
            rx.changed().await.ok()?;
            let current = rx.borrow_and_update().clone();
            Some((current, (rx, false)))
        });
        Ok(stream.boxed())
    }

    /// One-shot read of the current collection.
    pub fn read_once(&self, key: &CacheKey) -> Result<Vec<T>, StoreError> {
        Ok(self.entry(key)?.borrow().clone())
    }

    /// Apply a reconciliation plan atomically: remove matched occurrences,
    /// append the additions, persist, then notify observers.
    ///
    /// An empty plan is a no-op and does not rewrite the file.
    pub fn apply_plan(&self, key: &CacheKey, plan: &ReconciliationPlan<T>) -> Result<(), StoreError> {
        if plan.is_empty() {
            debug!(key = %key, "Empty plan, store untouched");
            return Ok(());
        }

        let tx = self.entry(key)?;
        // Hold the map lock across mutate+persist so two plans for the same
        // key can never interleave their writes.
        let entries = self.entries.lock().expect("collection store lock poisoned");

        let current = tx.borrow().clone();
        let mut next = unique_subtract(&current, &plan.to_remove);
        next.extend(plan.to_add.iter().cloned());

        // Write-then-rename so a failed write can never leave a truncated
        // cache file behind.
        let path = self.file_path(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&next)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;

        debug!(
            key = %key,
            removed = plan.to_remove.len(),
            added = plan.to_add.len(),
            total = next.len(),
            "Applied reconciliation plan"
        );
        tx.send_replace(next);
        drop(entries);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResourceKind;
    use crate::sync::reconcile;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: i64,
        text: String,
    }

    impl Identifiable for Note {
        type Id = i64;

        fn identity(&self) -> Self::Id {
            self.id
        }
    }

    fn note(id: i64, text: &str) -> Note {
        Note {
            id,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_read_once_empty_for_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new(ResourceKind::Notes, "1");
        assert!(store.read_once(&key).unwrap().is_empty());
    }

    #[test]
    fn test_apply_plan_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let key = CacheKey::new(ResourceKind::Notes, "1");
        {
            let store: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
            let plan = reconcile(&[], &[note(1, "a"), note(2, "b")]);
            store.apply_plan(&key, &plan).unwrap();
        }
        let reopened: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
        let items = reopened.read_once(&key).unwrap();
        assert_eq!(items, vec![note(1, "a"), note(2, "b")]);
    }

    #[test]
    fn test_plan_removes_matched_occurrence_only() {
        let dir = tempfile::tempdir().unwrap();
        let store: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new(ResourceKind::Notes, "1");

        store
            .apply_plan(&key, &reconcile(&[], &[note(1, "a"), note(1, "a"), note(2, "b")]))
            .unwrap();
        // Remove one of the two id=1 occurrences.
        let plan = ReconciliationPlan {
            to_remove: vec![note(1, "a")],
            to_add: vec![],
        };
        store.apply_plan(&key, &plan).unwrap();
        let items = store.read_once(&key).unwrap();
        assert_eq!(items, vec![note(1, "a"), note(2, "b")]);
    }

    #[test]
    fn test_write_leaves_no_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let store: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new(ResourceKind::Notes, "1");

        store.apply_plan(&key, &reconcile(&[], &[note(1, "a")])).unwrap();

        let path = store.file_path(&key);
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        // The committed file is whole and parseable.
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Note> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, vec![note(1, "a")]);
    }

    #[tokio::test]
    async fn test_observe_emits_current_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store: CollectionStore<Note> = CollectionStore::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new(ResourceKind::Notes, "1");

        let mut stream = store.observe(&key).unwrap();
        assert_eq!(stream.next().await.unwrap(), vec![]);

        store.apply_plan(&key, &reconcile(&[], &[note(1, "a")])).unwrap();
        assert_eq!(stream.next().await.unwrap(), vec![note(1, "a")]);
    }
}
