//! The composition root: owns every registry and drives the periodic work.
//!
//! A [`SyncSession`] is an explicit object — no ambient singletons — so tests
//! can run any number of independent sessions against scripted backends. The
//! UI layer holds one session, subscribes to its event channel, and reads
//! [`SyncSession::current_view`] whenever a [`SyncEvent::ViewChanged`]
//! arrives.
//!
//! ```text
//!   SyncSession
//!     ├── PendingCache ──┐
//!     ├── TombstoneRegistry ├─► Reconciler ─► merged view
//!     ├── snapshot cache ──┘
//!     ├── ConnectivityMonitor ─► offline→online edge ─► OfflineQueue.drain
//!     └── background tasks: poll (15 s), expiry tick (60 s), drain watcher
//! ```
//!
//! Every network call is wrapped in the request timeout; on expiry the engine
//! falls back to the last cached snapshot rather than blocking. All periodic
//! tasks are owned handles, aborted on [`SyncSession::shutdown`] or drop.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chipin_types::{
    ActionKind, ConnectivityState, MemberId, Need, NeedId, PendingRecord, QueuedAction, SyncEvent,
    now_millis,
};

use crate::backend::{Backend, BackendError};
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::expiry::apply_expirations_with;
use crate::outbox::OfflineQueue;
use crate::pending::PendingCache;
use crate::reconcile::Reconciler;
use crate::store::StateStore;
use crate::tombstones::TombstoneRegistry;

/// Storage key for the last authoritative snapshot (offline display).
const SNAPSHOT_KEY: &str = "last_snapshot";

/// A new need as submitted by the user.
#[derive(Clone, Debug)]
pub struct NeedDraft {
    pub owner_id: MemberId,
    pub title: String,
    pub goal_amount: u64,
}

struct SessionInner {
    backend: Arc<dyn Backend>,
    store: Arc<dyn StateStore>,
    config: SyncConfig,
    pending: Arc<PendingCache>,
    tombstones: Arc<TombstoneRegistry>,
    queue: Arc<OfflineQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    reconciler: Reconciler,
    events: broadcast::Sender<SyncEvent>,
    /// Last authoritative snapshot, served whenever the backend is
    /// unreachable. Never blocks a render on a failed sync.
    snapshot: Mutex<Vec<Need>>,
}

/// One member's sync engine instance.
pub struct SyncSession {
    inner: Arc<SessionInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncSession {
    /// Build a session and run startup housekeeping: tombstone GC, snapshot
    /// reload, and one expiration pass.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn StateStore>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let pending = Arc::new(PendingCache::load(store.clone()));
        let tombstones = Arc::new(TombstoneRegistry::load(store.clone()));
        let queue = Arc::new(OfflineQueue::load(store.clone()));
        let connectivity = Arc::new(ConnectivityMonitor::new());
        let reconciler = Reconciler::new(
            pending.clone(),
            tombstones.clone(),
            events.clone(),
            config.fuzzy_window_ms,
            config.pending_stale_after_ms,
        );

        let now = now_millis();
        tombstones.gc(config.tombstone_max_age_ms, now);

        let mut snapshot = store
            .get(SNAPSHOT_KEY)
            .and_then(|blob| match serde_json::from_str::<Vec<Need>>(&blob) {
                Ok(needs) => Some(needs),
                Err(e) => {
                    warn!("discarding corrupt snapshot blob: {e}");
                    None
                }
            })
            .unwrap_or_default();
        apply_expirations_with(&mut snapshot, now, config.default_need_lifetime_ms);

        let inner = Arc::new(SessionInner {
            backend,
            store,
            config,
            pending,
            tombstones,
            queue,
            connectivity,
            reconciler,
            events,
            snapshot: Mutex::new(snapshot),
        });
        Self {
            inner,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Current connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        self.inner.connectivity.state()
    }

    /// Offline-queue depth, for UI.
    pub fn queued_action_count(&self) -> usize {
        self.inner.queue.pending_count()
    }

    /// Pending (speculative) creation count.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// The merged view at `now_ms`: still-pending speculative needs first,
    /// then the cached authoritative snapshot, tombstones excluded.
    pub fn current_view(&self, now_ms: u64) -> Vec<Need> {
        let snapshot = self.inner.snapshot.lock().clone();
        self.inner.reconciler.merge(&snapshot, now_ms)
    }

    /// Speculatively create a need.
    ///
    /// The pending record is saved (and persisted) before the network call,
    /// so the item renders immediately and survives a restart. On a confirmed
    /// create the backend's entity replaces the speculative one in the cached
    /// snapshot; on a connectivity failure the mutation waits in the outbox
    /// and the pending record keeps the item visible. Returns the local id.
    pub async fn create_need(&self, draft: NeedDraft) -> Result<NeedId, BackendError> {
        let inner = &self.inner;
        let need = Need::new_local(
            draft.owner_id,
            draft.title,
            draft.goal_amount,
            now_millis(),
        );
        let local_id = need.id.clone();
        inner.pending.save(PendingRecord::new(need.clone()));
        inner.emit(SyncEvent::ViewChanged);

        let payload = json!({ "need": need });
        match inner.invoke("create_need", payload.clone()).await {
            Ok(value) => {
                match serde_json::from_value::<Need>(value.get("need").cloned().unwrap_or_default())
                {
                    Ok(confirmed) => {
                        // Splice first: between the two steps a concurrent
                        // merge sees both copies and fuzzy-dedupes them, so
                        // the item never blinks out of the view.
                        inner.splice_confirmed(confirmed);
                        inner.pending.remove(&local_id);
                        inner.emit(SyncEvent::ViewChanged);
                    }
                    Err(e) => {
                        // Leave the pending record for the reconciler's fuzzy
                        // path; the next snapshot will confirm it.
                        warn!("create_need response unparseable, deferring to merge: {e}");
                    }
                }
                Ok(local_id)
            }
            Err(e) if e.is_connectivity() => {
                inner.queue.enqueue(QueuedAction::new(
                    ActionKind::CreateNeed,
                    payload,
                    now_millis(),
                ));
                Ok(local_id)
            }
            Err(e) => {
                // Backend rejection: the pending record stays until it goes
                // stale, which surfaces PendingConfirmationFailed.
                Err(e)
            }
        }
    }

    /// Speculatively delete a need.
    ///
    /// The tombstone lands before the network call and persists on success
    /// (until GC) so eventual-consistency lag on the backend can never
    /// resurrect the item. Deleting a still-unconfirmed local need also
    /// retires its pending record; if the backend never saw the id there is
    /// nothing to invoke.
    pub async fn delete_need(&self, id: NeedId) -> Result<(), BackendError> {
        let inner = &self.inner;
        inner.tombstones.mark(id.clone(), now_millis());
        let had_pending = inner.pending.remove(&id).is_some();
        inner.emit(SyncEvent::ViewChanged);

        if id.is_local() && had_pending {
            // The backend never saw this id: nothing to invoke, and any
            // queued creation for it must not replay.
            let cancelled = inner.queue.discard_where(|a| {
                a.kind == ActionKind::CreateNeed
                    && a.payload
                        .pointer("/need/id")
                        .and_then(Value::as_str)
                        .is_some_and(|queued_id| queued_id == id.as_str())
            });
            debug!(%id, cancelled, "deleted unconfirmed local need, no backend call");
            return Ok(());
        }

        let payload = json!({ "need_id": id });
        match inner.invoke("delete_need", payload.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_connectivity() => {
                inner.queue.enqueue(QueuedAction::new(
                    ActionKind::DeleteNeed,
                    payload,
                    now_millis(),
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Contribute to a need. On connectivity failure the contribution waits
    /// in the outbox.
    pub async fn contribute(&self, need_id: NeedId, amount: u64) -> Result<(), BackendError> {
        let inner = &self.inner;
        let payload = json!({ "need_id": need_id, "amount": amount });
        match inner.invoke("contribute", payload.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_connectivity() => {
                inner.queue.enqueue(QueuedAction::new(
                    ActionKind::Contribute,
                    payload,
                    now_millis(),
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the authoritative snapshot and merge it.
    ///
    /// Degrades, never blocks: any failure serves the merge of the last
    /// cached snapshot instead.
    pub async fn refresh(&self) -> Vec<Need> {
        self.inner.refresh().await
    }

    /// Replay the offline queue now. Normally driven by the offline→online
    /// edge, but callable directly (e.g. a manual retry button).
    pub async fn drain_offline_queue(&self) {
        self.inner.drain_offline_queue().await;
    }

    /// Spawn the background tasks: snapshot poll, expiry tick, and the
    /// drain-on-reconnect watcher.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let poll = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                poll.refresh().await;
            }
        }));

        let expiry = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(expiry.config.expiry_tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                expiry.expiry_tick().await;
            }
        }));

        let drain = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let mut rx = drain.connectivity.subscribe();
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let online = rx.borrow_and_update().is_online();
                if online {
                    drain.drain_offline_queue().await;
                }
            }
        }));

        info!("sync session started");
    }

    /// Cancel all background work. Safe to call more than once.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Drop all local state — speculative records, queued actions, and the
    /// cached snapshot. Used on sign-out.
    pub fn sign_out(&self) {
        let inner = &self.inner;
        inner.pending.clear_all();
        inner.tombstones.clear_all();
        inner.queue.clear_all();
        inner.snapshot.lock().clear();
        inner.store.remove(SNAPSHOT_KEY);
        inner.emit(SyncEvent::ViewChanged);
        info!("sync session state cleared");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SessionInner {
    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine; the engine never depends on listeners.
        let _ = self.events.send(event);
    }

    /// One backend round trip under the request timeout, with connectivity
    /// bookkeeping on both edges.
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, BackendError> {
        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.backend.invoke(name, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        };

        match &result {
            Ok(_) => {
                if self.connectivity.report_success() {
                    self.emit(SyncEvent::ConnectivityChanged(ConnectivityState::Online));
                }
            }
            Err(e) if e.is_connectivity() => {
                if self.connectivity.report_connectivity_failure() {
                    self.emit(SyncEvent::ConnectivityChanged(ConnectivityState::Offline));
                }
            }
            // A backend rejection still proves the connection works.
            Err(_) => {
                if self.connectivity.report_success() {
                    self.emit(SyncEvent::ConnectivityChanged(ConnectivityState::Online));
                }
            }
        }
        result
    }

    async fn refresh(&self) -> Vec<Need> {
        let now = now_millis();
        match self.invoke("list_needs", json!({})).await {
            Ok(value) => {
                let parsed = serde_json::from_value::<Vec<Need>>(
                    value.get("needs").cloned().unwrap_or_default(),
                );
                match parsed {
                    Ok(mut needs) => {
                        apply_expirations_with(
                            &mut needs,
                            now,
                            self.config.default_need_lifetime_ms,
                        );
                        self.replace_snapshot(needs);
                        self.emit(SyncEvent::ViewChanged);
                    }
                    Err(e) => warn!("list_needs response unparseable, serving cache: {e}"),
                }
            }
            Err(e) => {
                debug!("snapshot fetch failed, serving cache: {e}");
            }
        }
        let snapshot = self.snapshot.lock().clone();
        self.reconciler.merge(&snapshot, now)
    }

    async fn expiry_tick(&self) {
        let now = now_millis();
        {
            let mut snapshot = self.snapshot.lock();
            if apply_expirations_with(&mut snapshot, now, self.config.default_need_lifetime_ms) > 0
            {
                let needs = snapshot.clone();
                drop(snapshot);
                self.persist_snapshot(&needs);
                self.emit(SyncEvent::ViewChanged);
            }
        }
        // Opportunistic poke at the backend's expiration job. Fire and
        // forget — no response contract beyond "it ran".
        let _ = self.invoke("expire_needs", json!({})).await;
    }

    async fn drain_offline_queue(&self) {
        if self.queue.pending_count() == 0 {
            return;
        }
        info!(depth = self.queue.pending_count(), "draining offline queue");
        let outcome = self
            .queue
            .drain(|action| async move {
                self.invoke(action.kind.invocation(), action.payload.clone())
                    .await
                    .map(|_| ())
            })
            .await;
        self.emit(SyncEvent::QueueDrained {
            replayed: outcome.replayed,
            remaining: outcome.remaining,
        });
        if outcome.replayed > 0 {
            self.refresh().await;
        }
    }

    /// Replace the speculative copy of a confirmed create in the cached
    /// snapshot so the item never flickers between confirmation and the next
    /// poll.
    fn splice_confirmed(&self, confirmed: Need) {
        let mut snapshot = self.snapshot.lock();
        snapshot.retain(|n| n.id != confirmed.id);
        snapshot.insert(0, confirmed);
        let needs = snapshot.clone();
        drop(snapshot);
        self.persist_snapshot(&needs);
    }

    fn replace_snapshot(&self, needs: Vec<Need>) {
        *self.snapshot.lock() = needs.clone();
        self.persist_snapshot(&needs);
    }

    fn persist_snapshot(&self, needs: &[Need]) {
        match serde_json::to_string(needs) {
            Ok(blob) => self.store.set(SNAPSHOT_KEY, &blob),
            Err(e) => warn!("failed to serialize snapshot: {e}"),
        }
    }
}
