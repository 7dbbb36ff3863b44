//! Durable outbox of mutations made while disconnected.
//!
//! Actions are replayed strictly in FIFO order, one at a time, because a
//! single owner's mutations are causally ordered — a queued `create_need`
//! must land before a later `contribute` that assumed it exists. The first
//! replay failure stops the drain and leaves the remainder intact for the
//! next online transition; there is no backoff and no retry ceiling.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use chipin_types::QueuedAction;

use crate::backend::BackendError;
use crate::store::StateStore;

/// Storage key for the ordered action list.
const STORE_KEY: &str = "offline_queue";

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Actions replayed successfully (and removed).
    pub replayed: usize,
    /// Actions still queued after the pass.
    pub remaining: usize,
}

/// Durable, ordered queue of [`QueuedAction`]s.
pub struct OfflineQueue {
    store: Arc<dyn StateStore>,
    actions: Mutex<Vec<QueuedAction>>,
    /// Held for the whole of a drain pass so overlapping drains (watcher-driven
    /// plus a manual retry) replay strictly one at a time.
    drain_gate: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    /// Load the queue from the store, dropping a corrupt blob.
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let actions = store
            .get(STORE_KEY)
            .and_then(
                |blob| match serde_json::from_str::<Vec<QueuedAction>>(&blob) {
                    Ok(list) => Some(list),
                    Err(e) => {
                        warn!("discarding corrupt offline-queue blob: {e}");
                        None
                    }
                },
            )
            .unwrap_or_default();
        Self {
            store,
            actions: Mutex::new(actions),
            drain_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Append and persist.
    pub fn enqueue(&self, action: QueuedAction) {
        let mut actions = self.actions.lock();
        info!(kind = ?action.kind, depth = actions.len() + 1, "queued offline action");
        actions.push(action);
        self.persist(&actions);
    }

    /// Queue depth, for UI.
    pub fn pending_count(&self) -> usize {
        self.actions.lock().len()
    }

    /// Replay queued actions in FIFO order, sequentially.
    ///
    /// Each action is consumed (and the queue re-persisted) only after its
    /// executor call succeeds. The first failure stops the pass; the failed
    /// action and everything behind it stay queued.
    ///
    /// Passes are serialized by [`Self::drain_gate`], so two overlapping
    /// drain calls cannot each replay (or each consume) the same action. The
    /// action lock is never held across the executor await — the head is
    /// cloned out, executed, then consumed under the lock, and only if it is
    /// still the head: `discard_where` or `clear_all` may have cancelled the
    /// in-flight action mid-replay, in which case there is nothing to remove.
    pub async fn drain<F, Fut>(&self, mut executor: F) -> DrainOutcome
    where
        F: FnMut(QueuedAction) -> Fut,
        Fut: Future<Output = Result<(), BackendError>>,
    {
        let _pass = self.drain_gate.lock().await;
        let mut replayed = 0;
        loop {
            let Some(head) = self.actions.lock().first().cloned() else {
                break;
            };
            match executor(head.clone()).await {
                Ok(()) => {
                    let mut actions = self.actions.lock();
                    if actions.first() == Some(&head) {
                        actions.remove(0);
                        self.persist(&actions);
                        replayed += 1;
                    }
                }
                Err(e) => {
                    warn!("offline replay halted: {e}");
                    break;
                }
            }
        }
        let remaining = self.pending_count();
        if replayed > 0 || remaining > 0 {
            info!(replayed, remaining, "offline queue drain finished");
        }
        DrainOutcome {
            replayed,
            remaining,
        }
    }

    /// Drop queued actions matching `predicate`. Returns the number dropped.
    ///
    /// Used when a later local action supersedes a queued one — deleting a
    /// still-unconfirmed need cancels its queued creation, otherwise the
    /// replay would resurrect an item the user already removed.
    pub fn discard_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueuedAction) -> bool,
    {
        let mut actions = self.actions.lock();
        let before = actions.len();
        actions.retain(|a| !predicate(a));
        let dropped = before - actions.len();
        if dropped > 0 {
            self.persist(&actions);
        }
        dropped
    }

    /// Drop everything — sign-out.
    pub fn clear_all(&self) {
        self.actions.lock().clear();
        self.store.remove(STORE_KEY);
    }

    fn persist(&self, actions: &[QueuedAction]) {
        match serde_json::to_string(actions) {
            Ok(blob) => self.store.set(STORE_KEY, &blob),
            Err(e) => warn!("failed to serialize offline queue: {e}"),
        }
    }
}
