//! Local-first reconciliation and offline-sync engine for chipin.
//!
//! The engine lets a client speculatively create and delete needs before the
//! backend confirms them, merges the periodic authoritative snapshot with the
//! speculative local state, queues mutations made while disconnected, and
//! advances the time-based expiration status deterministically.
//!
//! ```text
//!   user action                    periodic poll
//!       │                               │
//!       ▼                               ▼
//!  PendingCache / TombstoneRegistry   snapshot
//!       │                               │
//!       └──────────► Reconciler ◄───────┘
//!                        │
//!                   merged view ──► UI
//!
//!  network failure ──► OfflineQueue ──► drained on the
//!  (connectivity-shaped)               offline→online edge
//! ```
//!
//! # Guarantees
//!
//! - A freshly created item is visible exactly once, immediately, and never
//!   duplicated once the backend snapshot catches up.
//! - A deleted item never reappears while its tombstone is live.
//! - The merge is deterministic given (snapshot, pending set, tombstone set,
//!   now); interleaved fetches and mutations resolve at the next merge —
//!   eventual consistency within one poll interval.
//! - Storage is a durability optimization, never a correctness dependency:
//!   every storage failure is swallowed at the [`store`] boundary.
//!
//! # Known limitation
//!
//! Fuzzy confirmation matches on owner + normalized title + a 120 s creation
//! window. Two rapid identical-title submissions by the same user inside that
//! window can cross-confirm. The window is part of observable behavior and is
//! deliberately not widened or narrowed.

pub mod backend;
pub mod config;
pub mod connectivity;
pub mod constants;
pub mod expiry;
pub mod outbox;
pub mod pending;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod tombstones;

pub use backend::{Backend, BackendError};
pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use expiry::{apply_expirations, apply_expirations_with, is_expired, is_expired_with};
pub use outbox::{DrainOutcome, OfflineQueue};
pub use pending::PendingCache;
pub use reconcile::Reconciler;
pub use session::{NeedDraft, SyncSession};
pub use store::{FileStore, MemoryStore, StateStore};
pub use tombstones::TombstoneRegistry;
