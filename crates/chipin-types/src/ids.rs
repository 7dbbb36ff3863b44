//! Typed identifiers for needs and members.
//!
//! Both id types wrap the backend's opaque string ids. They display as-is for
//! logging and serialize transparently, so wire payloads stay plain strings.
//!
//! [`NeedId`] additionally supports a client-generated form: ids minted on the
//! device carry the reserved [`LOCAL_ID_PREFIX`] followed by a UUIDv7 simple
//! string. The backend never issues that prefix, so the local and
//! authoritative id spaces are disjoint and a speculative entity can be told
//! apart from a confirmed one with [`NeedId::is_local`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved prefix for client-generated ids. Never issued by the backend.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// A need identifier (backend-issued, or `local_`-prefixed while speculative).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeedId(String);

/// A member identifier (always backend-issued).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident) => {
        impl $T {
            /// Wrap an existing id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the raw id string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($T)).field(&self.0).finish()
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(NeedId);
impl_string_id!(MemberId);

impl NeedId {
    /// Mint a fresh client-generated id (`local_` + UUIDv7).
    ///
    /// UUIDv7 keeps local ids time-ordered, which makes pending records sort
    /// naturally by creation when listed.
    pub fn new_local() -> Self {
        Self(format!(
            "{LOCAL_ID_PREFIX}{}",
            uuid::Uuid::now_v7().as_simple()
        ))
    }

    /// Whether this id was minted on the device and is still unconfirmed.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }
}
