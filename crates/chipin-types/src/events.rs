//! Engine-to-presentation event types.
//!
//! The sync engine pushes these over a `tokio::sync::broadcast` channel so the
//! UI layer can re-render without polling engine internals. The enum lives in
//! the leaf crate so presentation code can depend on it without pulling the
//! engine in.

use serde::{Deserialize, Serialize};

use crate::ids::NeedId;

/// Process-wide connectivity, inferred purely from request outcomes.
///
/// Exactly one authoritative value at a time; transitions are idempotent
/// (re-publishing the same state does not notify subscribers).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    #[default]
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

/// Events the sync engine broadcasts to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// The merged view changed; callers should re-read it.
    ViewChanged,
    /// A speculative creation went stale without ever matching a backend
    /// entity. The presentation layer may surface this; the engine has
    /// already dropped the pending record.
    PendingConfirmationFailed { id: NeedId },
    /// Connectivity flipped.
    ConnectivityChanged(ConnectivityState),
    /// An offline-queue drain finished (possibly partially).
    QueueDrained { replayed: usize, remaining: usize },
}
