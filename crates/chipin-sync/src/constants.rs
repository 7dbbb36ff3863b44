//! Engine tuning constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.
//! [`SyncConfig`](crate::config::SyncConfig) defaults to these; tests override
//! them through the config rather than editing this file.

use std::time::Duration;

/// Interval between authoritative snapshot polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Interval between expiration ticks.
pub const EXPIRY_TICK: Duration = Duration::from_secs(60);

/// Timeout for a single backend round trip. On expiry the engine falls back
/// to the last cached snapshot rather than blocking.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fuzzy-confirmation creation window. Part of observable behavior — two
/// identical-title submissions by one owner inside this window cross-confirm.
pub const FUZZY_MATCH_WINDOW_MS: u64 = 120_000;

/// Age after which an unconfirmed pending record is permanently unconfirmable.
pub const PENDING_STALE_AFTER_MS: u64 = 30 * 60_000;

/// Tombstone GC age. Comfortably longer than any plausible backend
/// propagation delay, so a record is safe to forget by then.
pub const TOMBSTONE_MAX_AGE_MS: u64 = 24 * 60 * 60_000;

/// Default need lifetime when the backend sets no explicit deadline.
pub const DEFAULT_NEED_LIFETIME_MS: u64 = 14 * 24 * 60 * 60_000;

/// Capacity of the engine's broadcast event channel. Slow subscribers lag
/// rather than block the engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
