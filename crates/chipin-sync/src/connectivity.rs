//! Connectivity tracking, inferred purely from request outcomes.
//!
//! No OS-level connectivity polling: any successful round trip flips the
//! monitor online, any connectivity-shaped failure flips it offline. State is
//! published through a `tokio::sync::watch` channel, so the offline→online
//! edge that triggers queue draining is a plain `changed().await` on the
//! subscriber side.

use tokio::sync::watch;
use tracing::info;

use chipin_types::ConnectivityState;

/// Fixed vocabulary of connectivity-failure substrings. A failed request
/// whose error message contains one of these (case-insensitively) is treated
/// as a connectivity loss rather than a backend rejection.
const CONNECTIVITY_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "fetch",
    "connection refused",
    "connection reset",
    "dns",
];

/// Whether an error message classifies as connectivity-shaped.
pub fn is_connectivity_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    CONNECTIVITY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Two-state online/offline machine with idempotent transitions.
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Start online — the first failed round trip corrects this if wrong.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectivityState::Online);
        Self { tx }
    }

    /// Current authoritative state.
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Subscribe to transitions. Setting the same state twice is a no-op for
    /// subscribers — only actual edges wake them.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// A round trip succeeded. Returns true if this was an offline→online edge.
    pub fn report_success(&self) -> bool {
        self.set(ConnectivityState::Online)
    }

    /// A round trip failed for a connectivity-shaped reason. Returns true if
    /// this was an online→offline edge.
    pub fn report_connectivity_failure(&self) -> bool {
        self.set(ConnectivityState::Offline)
    }

    fn set(&self, next: ConnectivityState) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            info!("connectivity: {:?}", next);
        }
        changed
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
