//! End-to-end engine scenarios against a scripted backend double.
//!
//! These walk the full create/poll/confirm and delete/lag paths through a
//! real [`SyncSession`], exercising reconciliation, tombstone dominance, and
//! offline replay together rather than per module.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use chipin_sync::{Backend, BackendError, MemoryStore, NeedDraft, SyncConfig, SyncSession};
use chipin_types::{ConnectivityState, MemberId, Need, NeedId, NeedStatus, now_millis};

/// Scripted backend: named responses are served per invocation name, FIFO;
/// an unscripted invocation answers `{}`.
#[derive(Default)]
struct MockBackend {
    scripts: Mutex<Vec<(String, VecDeque<Result<Value, BackendError>>)>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn script(&self, name: &str, response: Result<Value, BackendError>) {
        let mut scripts = self.scripts.lock();
        if let Some((_, queue)) = scripts.iter_mut().find(|(n, _)| n == name) {
            queue.push_back(response);
        } else {
            scripts.push((name.to_string(), VecDeque::from([response])));
        }
    }

    fn call_names(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn invoke(&self, name: &str, _payload: Value) -> Result<Value, BackendError> {
        self.calls.lock().push(name.to_string());
        let mut scripts = self.scripts.lock();
        scripts
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, queue)| queue.pop_front())
            .unwrap_or_else(|| Ok(json!({})))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn session(backend: Arc<MockBackend>) -> SyncSession {
    SyncSession::new(backend, Arc::new(MemoryStore::new()), SyncConfig::default())
}

fn server_need(id: &str, owner: &str, title: &str, created_at: u64) -> Need {
    Need {
        id: NeedId::new(id),
        owner_id: MemberId::new(owner),
        title: title.to_string(),
        status: NeedStatus::Collecting,
        raised_amount: 0,
        goal_amount: 2_500,
        created_at,
        expires_at: None,
    }
}

/// A locally created need stays visible exactly once through a snapshot that
/// lacks it, then hands over to the backend entity once a fuzzy-matching
/// snapshot arrives.
#[tokio::test]
async fn created_need_hands_over_to_snapshot_without_flicker() {
    init_tracing();
    let backend = Arc::new(MockBackend::default());
    // The create round trip fails on connectivity, so confirmation can only
    // come from a later snapshot.
    backend.script(
        "create_need",
        Err(BackendError::Transport("network unreachable".into())),
    );
    let s = session(backend.clone());

    let local_id = s
        .create_need(NeedDraft {
            owner_id: MemberId::new("u1"),
            title: "Bus pass".to_string(),
            goal_amount: 2_500,
        })
        .await
        .unwrap();
    let t0 = s.current_view(now_millis())[0].created_at;

    // Poll ~5 s later: the backend snapshot does not carry the need yet.
    backend.script("list_needs", Ok(json!({ "needs": [] })));
    let view = s.refresh().await;
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id, local_id);

    // Poll ~70 s later: the entity arrived under a backend id, created 30 s
    // after the local submission — inside the fuzzy window.
    let confirmed = server_need("srv_9", "u1", "Bus pass", t0 + 30_000);
    backend.script("list_needs", Ok(json!({ "needs": [confirmed] })));
    let view = s.refresh().await;

    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id.as_str(), "srv_9");
    assert_eq!(s.pending_count(), 0);
}

/// A need deleted while offline never reappears across polls whose snapshots
/// still carry it (eventual-consistency lag).
#[tokio::test]
async fn deleted_need_never_resurrects_across_lagging_polls() {
    init_tracing();
    let backend = Arc::new(MockBackend::default());
    backend.script("delete_need", Err(BackendError::Timeout));
    let s = session(backend.clone());

    s.delete_need(NeedId::new("n7")).await.unwrap();
    assert_eq!(s.connectivity(), ConnectivityState::Offline);
    assert_eq!(s.queued_action_count(), 1);

    let lagging = json!({ "needs": [
        server_need("n7", "u2", "Rent help", 1_000),
        server_need("srv_8", "u3", "Groceries", 2_000),
    ] });
    for _ in 0..3 {
        backend.script("list_needs", Ok(lagging.clone()));
        let view = s.refresh().await;
        assert!(view.iter().all(|n| n.id.as_str() != "n7"));
        assert_eq!(view.len(), 1);
    }
}

/// Queued mutations replay in order on the offline→online edge, and the
/// successful replay flips the monitor back online.
#[tokio::test]
async fn offline_mutations_replay_after_reconnect() {
    init_tracing();
    let backend = Arc::new(MockBackend::default());
    backend.script("contribute", Err(BackendError::Transport("timeout".into())));
    backend.script(
        "delete_need",
        Err(BackendError::Transport("network down".into())),
    );
    let s = session(backend.clone());

    s.contribute(NeedId::new("srv_1"), 500).await.unwrap();
    s.delete_need(NeedId::new("srv_2")).await.unwrap();
    assert_eq!(s.queued_action_count(), 2);
    assert_eq!(s.connectivity(), ConnectivityState::Offline);

    // Connectivity returns; both replays succeed (unscripted → Ok).
    s.drain_offline_queue().await;

    assert_eq!(s.queued_action_count(), 0);
    assert_eq!(s.connectivity(), ConnectivityState::Online);
    let names = backend.call_names();
    let replayed: Vec<&str> = names
        .iter()
        .skip(2)
        .take(2)
        .map(String::as_str)
        .collect();
    assert_eq!(replayed, ["contribute", "delete_need"]);
}

/// A replay failure halts the drain and keeps causal order for next time.
#[tokio::test]
async fn replay_failure_preserves_queue_order() {
    init_tracing();
    let backend = Arc::new(MockBackend::default());
    backend.script("create_need", Err(BackendError::Timeout));
    let s = session(backend.clone());

    s.create_need(NeedDraft {
        owner_id: MemberId::new("u1"),
        title: "Bus pass".to_string(),
        goal_amount: 2_500,
    })
    .await
    .unwrap();
    backend.script("contribute", Err(BackendError::Timeout));
    s.contribute(NeedId::new("srv_1"), 500).await.unwrap();
    assert_eq!(s.queued_action_count(), 2);

    // First replay attempt fails again: nothing is lost, nothing reorders.
    backend.script("create_need", Err(BackendError::Timeout));
    s.drain_offline_queue().await;
    assert_eq!(s.queued_action_count(), 2);

    // Next pass succeeds end to end.
    s.drain_offline_queue().await;
    assert_eq!(s.queued_action_count(), 0);
}

/// The engine state is durable: a restart mid-offline keeps the speculative
/// need, the tombstone, and the queued mutations.
#[tokio::test]
async fn restart_preserves_speculative_state() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(MockBackend::default());
    backend.script("create_need", Err(BackendError::Timeout));
    backend.script("delete_need", Err(BackendError::Timeout));

    {
        let s = SyncSession::new(backend.clone(), store.clone(), SyncConfig::default());
        s.create_need(NeedDraft {
            owner_id: MemberId::new("u1"),
            title: "Bus pass".to_string(),
            goal_amount: 2_500,
        })
        .await
        .unwrap();
        s.delete_need(NeedId::new("n7")).await.unwrap();
    }

    let s = SyncSession::new(backend, store, SyncConfig::default());
    assert_eq!(s.pending_count(), 1);
    assert_eq!(s.queued_action_count(), 2);
    let view = s.current_view(now_millis());
    assert_eq!(view.len(), 1);
    assert!(view[0].id.is_local());
    assert!(view.iter().all(|n| n.id.as_str() != "n7"));
}
