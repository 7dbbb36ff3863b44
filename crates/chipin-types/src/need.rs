//! The `Need` entity — a funding request with a goal and raised amount.
//!
//! Needs are owned by the backend; the client only ever holds a read-through
//! copy, except for the speculative instance wrapped in a
//! [`PendingRecord`](crate::records::PendingRecord) between local creation and
//! backend confirmation.

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{MemberId, NeedId};

/// Lifecycle status of a need.
///
/// Only `Collecting` needs are subject to time-based expiry; every other
/// status is terminal from the client's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum NeedStatus {
    /// Open for contributions.
    #[default]
    Collecting,
    /// Raised amount reached the goal.
    GoalMet,
    /// Owner asked for the collected amount to be paid out.
    PayoutRequested,
    /// Payout completed.
    Paid,
    /// Deadline passed before the goal was met.
    Expired,
}

impl NeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedStatus::Collecting => "collecting",
            NeedStatus::GoalMet => "goal_met",
            NeedStatus::PayoutRequested => "payout_requested",
            NeedStatus::Paid => "paid",
            NeedStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for NeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A funding request.
///
/// Amounts are in minor currency units (cents). Timestamps are Unix millis.
/// `expires_at = None` means the default lifetime applies (the expiration
/// clock derives the effective deadline from `created_at`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Need {
    pub id: NeedId,
    pub owner_id: MemberId,
    pub title: String,
    pub status: NeedStatus,
    pub raised_amount: u64,
    pub goal_amount: u64,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Need {
    /// Build a speculative need with a fresh client-generated id.
    ///
    /// This is the shape a [`PendingRecord`](crate::records::PendingRecord)
    /// wraps: `Collecting`, nothing raised yet, created now.
    pub fn new_local(
        owner_id: MemberId,
        title: impl Into<String>,
        goal_amount: u64,
        created_at: u64,
    ) -> Self {
        Self {
            id: NeedId::new_local(),
            owner_id,
            title: title.into(),
            status: NeedStatus::Collecting,
            raised_amount: 0,
            goal_amount,
            created_at,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_as_snake_case() {
        let json = serde_json::to_string(&NeedStatus::PayoutRequested).unwrap();
        assert_eq!(json, "\"payout_requested\"");
        let back: NeedStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NeedStatus::PayoutRequested);
        assert_eq!(NeedStatus::from_str("GOAL_MET").unwrap(), NeedStatus::GoalMet);
    }

    #[test]
    fn new_local_is_speculative() {
        let need = Need::new_local(MemberId::new("u1"), "Bus pass", 2500, 1_000);
        assert!(need.id.is_local());
        assert_eq!(need.status, NeedStatus::Collecting);
        assert_eq!(need.raised_amount, 0);
        assert_eq!(need.expires_at, None);
    }

    #[test]
    fn need_serde_round_trip() {
        let need = Need {
            id: NeedId::new("srv_9"),
            owner_id: MemberId::new("u1"),
            title: "Bus pass".to_string(),
            status: NeedStatus::Collecting,
            raised_amount: 500,
            goal_amount: 2500,
            created_at: 1_700_000_000_000,
            expires_at: Some(1_700_900_000_000),
        };
        let json = serde_json::to_string(&need).unwrap();
        let back: Need = serde_json::from_str(&json).unwrap();
        assert_eq!(back, need);
    }
}
