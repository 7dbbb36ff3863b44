//! Backend invocation contract.
//!
//! The engine talks to the backend through one narrow asynchronous call:
//! a request name plus a JSON payload in, a JSON result or a typed error out.
//! There is no idempotency guarantee from the caller's side — replays after a
//! connectivity failure may deliver a mutation twice, and the backend (or the
//! user) has to tolerate that.
//!
//! Request names used by the engine: `list_needs`, `create_need`,
//! `delete_need`, `contribute`, `expire_needs`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::connectivity::is_connectivity_message;

/// A failed backend invocation.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The round trip exceeded the engine's request timeout.
    #[error("request timed out")]
    Timeout,

    /// The request never produced a response (socket, DNS, fetch layer).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error payload.
    #[error("backend rejected {name}: {message}")]
    Api { name: String, message: String },

    /// The backend answered, but not in the shape the engine expects.
    #[error("malformed response to {name}: {message}")]
    Malformed { name: String, message: String },
}

impl BackendError {
    /// Whether this failure is connectivity-shaped: it flips the monitor
    /// offline and routes the mutation to the offline queue instead of
    /// surfacing to the user.
    ///
    /// Timeouts always classify; everything else is matched against the fixed
    /// substring vocabulary, so a backend rejection ("validation failed")
    /// never masquerades as a dropped connection.
    pub fn is_connectivity(&self) -> bool {
        match self {
            BackendError::Timeout => true,
            BackendError::Transport(message) => is_connectivity_message(message),
            BackendError::Api { message, .. } => is_connectivity_message(message),
            BackendError::Malformed { .. } => false,
        }
    }
}

/// Asynchronous backend invocation: name + payload in, result/error out.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, BackendError>;
}
