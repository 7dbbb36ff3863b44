//! Shared domain types for chipin.
//!
//! This crate is the leaf foundation: typed ids, the [`Need`] entity, the
//! speculative-state records the sync engine tracks, and the event types it
//! broadcasts. It has **no internal chipin dependencies** — a pure leaf crate
//! that the engine builds on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Member (MemberId)
//!     └── owns Need (NeedId)
//!     └── contributes to Need
//!
//! Need (NeedId) ← funding request, authoritative on the backend
//!     └── speculative copy lives in a PendingRecord until confirmed
//!     └── local deletion leaves a TombstoneRecord
//!     └── mutations made offline wait as QueuedAction
//! ```
//!
//! The client-generated id space is disjoint from the backend's: local ids
//! carry the `local_` prefix, which the backend never issues, so a pending
//! copy can never collide with an authoritative entity.

pub mod events;
pub mod ids;
pub mod need;
pub mod records;

// Re-export primary types at crate root for convenience.
pub use events::{ConnectivityState, SyncEvent};
pub use ids::{LOCAL_ID_PREFIX, MemberId, NeedId};
pub use need::{Need, NeedStatus};
pub use records::{ActionKind, PendingRecord, QueuedAction, TombstoneRecord};

/// Current time as Unix milliseconds. Used by constructors throughout chipin.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
