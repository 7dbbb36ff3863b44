//! Merging an authoritative snapshot with speculative local state.
//!
//! This is the load-bearing piece of the engine: it guarantees a user's own
//! freshly created item is visible exactly once, immediately, and never
//! duplicated once the backend snapshot catches up — and that a deleted item
//! never reappears while its tombstone is live.
//!
//! `merge` is deterministic given the snapshot, the pending set, the
//! tombstone set, and `now`. It is also the place pending records are retired
//! (confirmation or staleness), which is intentional: reconciliation owns the
//! pending lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use chipin_types::{Need, NeedId, SyncEvent};

use crate::pending::PendingCache;
use crate::tombstones::TombstoneRegistry;

/// Title normalization used by fuzzy confirmation: trimmed, case-insensitive.
fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// How a pending record fared against the snapshot.
enum Disposition {
    /// A server entity matched (exact id or fuzzy); the pending record is
    /// retired and the server entity preferred.
    Confirmed,
    /// Too old to ever be confirmed; retired silently apart from the
    /// [`SyncEvent::PendingConfirmationFailed`] broadcast.
    Stale,
    /// No match yet, still young — keep showing the speculative entity.
    StillPending,
}

/// The reconciliation engine.
///
/// Holds handles to the two speculative registries and the event channel;
/// the snapshot and `now` arrive per call.
pub struct Reconciler {
    pending: Arc<PendingCache>,
    tombstones: Arc<TombstoneRegistry>,
    events: broadcast::Sender<SyncEvent>,
    fuzzy_window_ms: u64,
    stale_after_ms: u64,
}

impl Reconciler {
    pub fn new(
        pending: Arc<PendingCache>,
        tombstones: Arc<TombstoneRegistry>,
        events: broadcast::Sender<SyncEvent>,
        fuzzy_window_ms: u64,
        stale_after_ms: u64,
    ) -> Self {
        Self {
            pending,
            tombstones,
            events,
            fuzzy_window_ms,
            stale_after_ms,
        }
    }

    /// Merge `server` with the current pending/tombstone state into the view
    /// the rest of the app renders.
    ///
    /// Output order: still-pending speculative entities first (newest first),
    /// then the authoritative list in its original order. Tombstoned ids are
    /// excluded everywhere; confirmed ids appear exactly once, as the server
    /// copy.
    pub fn merge(&self, server: &[Need], now_ms: u64) -> Vec<Need> {
        let server_ids: HashSet<&NeedId> = server.iter().map(|n| &n.id).collect();

        let mut still_pending = Vec::new();
        for record in self.pending.list() {
            match self.classify(&record.need, &server_ids, server, now_ms) {
                Disposition::Confirmed => {
                    debug!(id = %record.need.id, "pending record confirmed by snapshot");
                    self.pending.remove(&record.need.id);
                }
                Disposition::Stale => {
                    info!(id = %record.need.id, "pending record went stale, dropping");
                    let id = record.need.id.clone();
                    self.pending.remove(&id);
                    let _ = self
                        .events
                        .send(SyncEvent::PendingConfirmationFailed { id });
                }
                Disposition::StillPending => still_pending.push(record.need),
            }
        }

        let tombstoned = self.tombstones.ids_set();
        let visible_server: Vec<&Need> = server
            .iter()
            .filter(|n| !tombstoned.contains(&n.id))
            .collect();
        let visible_ids: HashSet<&NeedId> = visible_server.iter().map(|n| &n.id).collect();

        // Pending first, newest first; the cache lists oldest first.
        let mut merged: Vec<Need> = still_pending
            .into_iter()
            .rev()
            .filter(|p| !visible_ids.contains(&p.id) && !tombstoned.contains(&p.id))
            .collect();
        merged.extend(visible_server.into_iter().cloned());
        merged
    }

    fn classify(
        &self,
        pending: &Need,
        server_ids: &HashSet<&NeedId>,
        server: &[Need],
        now_ms: u64,
    ) -> Disposition {
        if server_ids.contains(&pending.id) {
            return Disposition::Confirmed;
        }
        if self.fuzzy_match(pending, server) {
            return Disposition::Confirmed;
        }
        if now_ms.saturating_sub(pending.created_at) > self.stale_after_ms {
            return Disposition::Stale;
        }
        Disposition::StillPending
    }

    /// Heuristic confirmation when the backend assigned its own id: same
    /// owner, same normalized title, created within the fuzzy window.
    ///
    /// Known limitation: two rapid identical-title submissions by one owner
    /// inside the window cross-confirm against a single server entity. The
    /// window is observable behavior and stays at its documented width.
    fn fuzzy_match(&self, pending: &Need, server: &[Need]) -> bool {
        let wanted = normalize_title(&pending.title);
        server.iter().any(|s| {
            s.owner_id == pending.owner_id
                && normalize_title(&s.title) == wanted
                && s.created_at.abs_diff(pending.created_at) < self.fuzzy_window_ms
        })
    }
}
