//! Engine configuration.

use std::time::Duration;

use crate::constants;

/// Tunables for a [`SyncSession`](crate::session::SyncSession).
///
/// `Default` mirrors the production values in [`constants`]. Tests shrink the
/// windows to keep scenarios fast and deterministic.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Interval between authoritative snapshot polls.
    pub poll_interval: Duration,
    /// Interval between expiration ticks.
    pub expiry_tick: Duration,
    /// Timeout applied to every backend round trip.
    pub request_timeout: Duration,
    /// Fuzzy-confirmation creation window, millis.
    pub fuzzy_window_ms: u64,
    /// Pending record staleness threshold, millis.
    pub pending_stale_after_ms: u64,
    /// Tombstone GC age, millis.
    pub tombstone_max_age_ms: u64,
    /// Need lifetime when no explicit deadline is set, millis.
    pub default_need_lifetime_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: constants::POLL_INTERVAL,
            expiry_tick: constants::EXPIRY_TICK,
            request_timeout: constants::REQUEST_TIMEOUT,
            fuzzy_window_ms: constants::FUZZY_MATCH_WINDOW_MS,
            pending_stale_after_ms: constants::PENDING_STALE_AFTER_MS,
            tombstone_max_age_ms: constants::TOMBSTONE_MAX_AGE_MS,
            default_need_lifetime_ms: constants::DEFAULT_NEED_LIFETIME_MS,
        }
    }
}
