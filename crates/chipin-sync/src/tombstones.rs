//! Registry of locally deleted ids.
//!
//! A tombstone is recorded the instant the user deletes a need, before the
//! network call completes, and dominates every merged view until GC forgets
//! it. Records are never mutated — only inserted (idempotently) or purged by
//! age.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use chipin_types::{NeedId, TombstoneRecord};

use crate::store::StateStore;

/// Storage key for the tombstone list.
const STORE_KEY: &str = "deleted_needs";

/// Persisted set of [`TombstoneRecord`]s keyed by need id.
pub struct TombstoneRegistry {
    store: Arc<dyn StateStore>,
    records: Mutex<IndexMap<NeedId, TombstoneRecord>>,
}

impl TombstoneRegistry {
    /// Load the registry from the store, dropping a corrupt blob.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let records = store
            .get(STORE_KEY)
            .and_then(
                |blob| match serde_json::from_str::<Vec<TombstoneRecord>>(&blob) {
                    Ok(list) => Some(list),
                    Err(e) => {
                        warn!("discarding corrupt tombstone blob: {e}");
                        None
                    }
                },
            )
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self {
            store,
            records: Mutex::new(records),
        }
    }

    /// Record a deletion. Idempotent — the first timestamp wins, so repeated
    /// deletes of the same id never extend a tombstone's life.
    pub fn mark(&self, id: NeedId, now_ms: u64) {
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return;
        }
        records.insert(
            id.clone(),
            TombstoneRecord {
                id,
                deleted_at: now_ms,
            },
        );
        self.persist(&records);
    }

    pub fn is_deleted(&self, id: &NeedId) -> bool {
        self.records.lock().contains_key(id)
    }

    /// Snapshot of every tombstoned id.
    pub fn ids_set(&self) -> HashSet<NeedId> {
        self.records.lock().keys().cloned().collect()
    }

    /// Purge records older than `max_age_ms`. Run once at session start.
    /// Returns the number purged.
    pub fn gc(&self, max_age_ms: u64, now_ms: u64) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| now_ms.saturating_sub(r.deleted_at) <= max_age_ms);
        let purged = before - records.len();
        if purged > 0 {
            debug!("tombstone gc purged {purged} record(s)");
            self.persist(&records);
        }
        purged
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

    fn persist(&self, records: &IndexMap<NeedId, TombstoneRecord>) {
        let list: Vec<&TombstoneRecord> = records.values().collect();
        match serde_json::to_string(&list) {
            Ok(blob) => self.store.set(STORE_KEY, &blob),
            Err(e) => warn!("failed to serialize tombstones: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> TombstoneRegistry {
        TombstoneRegistry::load(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn mark_is_idempotent_first_timestamp_wins() {
        let reg = registry();
        reg.mark(NeedId::new("n7"), 100);
        reg.mark(NeedId::new("n7"), 9_999);
        assert_eq!(reg.len(), 1);
        // Second mark did not refresh the timestamp: a GC cutting at the
        // original age must still purge it.
        assert_eq!(reg.gc(500, 1_000), 1);
        assert!(!reg.is_deleted(&NeedId::new("n7")));
    }

    #[test]
    fn gc_keeps_young_records() {
        let reg = registry();
        reg.mark(NeedId::new("old"), 0);
        reg.mark(NeedId::new("young"), 900);
        assert_eq!(reg.gc(500, 1_000), 1);
        assert!(reg.is_deleted(&NeedId::new("young")));
        assert!(!reg.is_deleted(&NeedId::new("old")));
    }

    #[test]
    fn ids_set_snapshots_all_ids() {
        let reg = registry();
        reg.mark(NeedId::new("a"), 1);
        reg.mark(NeedId::new("b"), 2);
        let ids = reg.ids_set();
        assert!(ids.contains(&NeedId::new("a")));
        assert!(ids.contains(&NeedId::new("b")));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn survives_reload_from_store() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        {
            let reg = TombstoneRegistry::load(store.clone());
            reg.mark(NeedId::new("n7"), 42);
        }
        let reg = TombstoneRegistry::load(store);
        assert!(reg.is_deleted(&NeedId::new("n7")));
    }

    #[test]
    fn clear_all_empties_registry_and_store() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let reg = TombstoneRegistry::load(store.clone());
        reg.mark(NeedId::new("n7"), 42);
        reg.clear_all();
        assert!(reg.is_empty());
        assert_eq!(store.get(STORE_KEY), None);
    }
}
