//! Speculative-state records tracked by the sync engine.
//!
//! These are the only entities with a confirmation lifecycle: born the instant
//! a user acts, before any network round trip, and retired either by backend
//! confirmation, by going stale, or (tombstones) by timed GC. All three are
//! persisted so a process restart before confirmation loses nothing.

use serde::{Deserialize, Serialize};

use crate::ids::{MemberId, NeedId};
use crate::need::Need;

/// A not-yet-confirmed creation: the full speculative [`Need`] payload under
/// a client-generated id.
///
/// Mutated only by removal — confirmation (the backend snapshot now carries
/// the entity) or staleness (no confirmation arrived within the window).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub need: Need,
}

impl PendingRecord {
    pub fn new(need: Need) -> Self {
        Self { need }
    }

    pub fn id(&self) -> &NeedId {
        &self.need.id
    }

    pub fn owner_id(&self) -> &MemberId {
        &self.need.owner_id
    }

    /// When the user submitted the creation (the speculative need's own
    /// `created_at` — there is no separate submission timestamp).
    pub fn created_at(&self) -> u64 {
        self.need.created_at
    }
}

/// A locally deleted id, recorded before the delete round trip completes.
///
/// Never mutated after insertion; purged only by age. While a tombstone is
/// live its id is excluded from every merged view, no matter how many stale
/// backend snapshots still carry the entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneRecord {
    pub id: NeedId,
    pub deleted_at: u64,
}

/// Kind of mutation waiting in the offline queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Contribute,
    CreateNeed,
    DeleteNeed,
}

impl ActionKind {
    /// Backend invocation name for replaying this action.
    pub fn invocation(&self) -> &'static str {
        match self {
            ActionKind::Contribute => "contribute",
            ActionKind::CreateNeed => "create_need",
            ActionKind::DeleteNeed => "delete_need",
        }
    }
}

/// A mutation that failed for a connectivity-shaped reason and waits in the
/// durable outbox until the next offline→online transition.
///
/// The payload is the exact backend invocation payload, so replay is a plain
/// re-invocation. Consumed only after a successful replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub kind: ActionKind,
    pub payload: serde_json::Value,
    pub queued_at: u64,
}

impl QueuedAction {
    pub fn new(kind: ActionKind, payload: serde_json::Value, queued_at: u64) -> Self {
        Self {
            kind,
            payload,
            queued_at,
        }
    }
}
