//! Cache of speculative, not-yet-confirmed creations.
//!
//! Pure local bookkeeping plus persistence — no network access. The
//! reconciler is the only component that retires records here (besides the
//! direct create-confirmation path in the session and sign-out).

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::warn;

use chipin_types::{NeedId, PendingRecord};

use crate::store::StateStore;

/// Storage key for the ordered pending-record list.
const STORE_KEY: &str = "pending_needs";

/// Insertion-ordered set of [`PendingRecord`]s, persisted as one JSON blob.
pub struct PendingCache {
    store: Arc<dyn StateStore>,
    records: Mutex<IndexMap<NeedId, PendingRecord>>,
}

impl PendingCache {
    /// Load the cache from the store. A corrupt blob is logged and dropped —
    /// an empty cache is always a safe starting point.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let records = store
            .get(STORE_KEY)
            .and_then(|blob| match serde_json::from_str::<Vec<PendingRecord>>(&blob) {
                Ok(list) => Some(list),
                Err(e) => {
                    warn!("discarding corrupt pending-record blob: {e}");
                    None
                }
            })
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id().clone(), r))
            .collect();
        Self {
            store,
            records: Mutex::new(records),
        }
    }

    /// All pending records in insertion order (oldest first).
    pub fn list(&self) -> Vec<PendingRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Insert or replace by id, then persist the full set.
    pub fn save(&self, record: PendingRecord) {
        let mut records = self.records.lock();
        records.insert(record.id().clone(), record);
        self.persist(&records);
    }

    /// Remove by id; no-op if absent. Returns the removed record.
    pub fn remove(&self, id: &NeedId) -> Option<PendingRecord> {
        let mut records = self.records.lock();
        let removed = records.shift_remove(id);
        if removed.is_some() {
            self.persist(&records);
        }
        removed
    }

    /// Whether a record with this id is pending.
    pub fn contains(&self, id: &NeedId) -> bool {
        self.records.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop everything — sign-out.
    pub fn clear_all(&self) {
        self.records.lock().clear();
        self.store.remove(STORE_KEY);
    }

    fn persist(&self, records: &IndexMap<NeedId, PendingRecord>) {
        let list: Vec<&PendingRecord> = records.values().collect();
        match serde_json::to_string(&list) {
            Ok(blob) => self.store.set(STORE_KEY, &blob),
            Err(e) => warn!("failed to serialize pending records: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chipin_types::{MemberId, Need};

    fn record(title: &str, created_at: u64) -> PendingRecord {
        PendingRecord::new(Need::new_local(
            MemberId::new("u1"),
            title,
            1_000,
            created_at,
        ))
    }

    #[test]
    fn save_deduplicates_by_id() {
        let cache = PendingCache::load(Arc::new(MemoryStore::new()));
        let mut rec = record("Bus pass", 10);
        cache.save(rec.clone());
        rec.need.goal_amount = 2_000;
        cache.save(rec.clone());
        let listed = cache.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].need.goal_amount, 2_000);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let cache = PendingCache::load(Arc::new(MemoryStore::new()));
        let first = record("first", 1);
        let second = record("second", 2);
        cache.save(first.clone());
        cache.save(second.clone());
        let titles: Vec<_> = cache.list().iter().map(|r| r.need.title.clone()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn remove_absent_is_noop() {
        let cache = PendingCache::load(Arc::new(MemoryStore::new()));
        assert!(cache.remove(&NeedId::new("missing")).is_none());
    }

    #[test]
    fn survives_reload_from_store() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let rec = record("Bus pass", 10);
        {
            let cache = PendingCache::load(store.clone());
            cache.save(rec.clone());
        }
        let cache = PendingCache::load(store);
        assert_eq!(cache.list(), vec![rec]);
    }

    #[test]
    fn corrupt_blob_starts_empty() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        store.set(STORE_KEY, "not json");
        let cache = PendingCache::load(store);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_all_empties_cache_and_store() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cache = PendingCache::load(store.clone());
        cache.save(record("Bus pass", 10));
        cache.clear_all();
        assert!(cache.is_empty());
        assert_eq!(store.get(STORE_KEY), None);
    }
}
