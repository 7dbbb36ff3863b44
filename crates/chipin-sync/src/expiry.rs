//! Time-based expiration of collecting needs.
//!
//! Pure functions over an injected `now` — the session's periodic tick (and
//! one call at startup) supplies wall-clock time; tests supply fixed
//! timestamps. A backend-side expiration job exists as an external
//! collaborator; the session pokes it opportunistically, fire-and-forget.

use chipin_types::{Need, NeedStatus};

use crate::constants::DEFAULT_NEED_LIFETIME_MS;

/// Whether `need` is past its effective deadline at `now_ms`.
///
/// An already-`Expired` need is trivially expired. A need in any other
/// non-`Collecting` status is never subject to time-based expiry — money that
/// has been raised or paid out does not lapse. Otherwise the effective
/// deadline is `expires_at`, or `created_at` plus the default lifetime when
/// the backend set none.
pub fn is_expired(need: &Need, now_ms: u64) -> bool {
    is_expired_with(need, now_ms, DEFAULT_NEED_LIFETIME_MS)
}

/// [`is_expired`] with an explicit default lifetime.
pub fn is_expired_with(need: &Need, now_ms: u64, default_lifetime_ms: u64) -> bool {
    match need.status {
        NeedStatus::Expired => true,
        NeedStatus::Collecting => {
            let effective_expiry = need
                .expires_at
                .unwrap_or_else(|| need.created_at.saturating_add(default_lifetime_ms));
            now_ms >= effective_expiry
        }
        _ => false,
    }
}

/// Flip every expired `Collecting` need to `Expired`, leaving all others
/// untouched. Returns the number of needs transitioned.
///
/// Idempotent and monotonic: reapplying with the same or a larger `now` never
/// changes anything further, and never reverts an `Expired` status.
pub fn apply_expirations(needs: &mut [Need], now_ms: u64) -> usize {
    apply_expirations_with(needs, now_ms, DEFAULT_NEED_LIFETIME_MS)
}

/// [`apply_expirations`] with an explicit default lifetime.
pub fn apply_expirations_with(
    needs: &mut [Need],
    now_ms: u64,
    default_lifetime_ms: u64,
) -> usize {
    let mut transitioned = 0;
    for need in needs.iter_mut() {
        if need.status == NeedStatus::Collecting
            && is_expired_with(need, now_ms, default_lifetime_ms)
        {
            need.status = NeedStatus::Expired;
            transitioned += 1;
        }
    }
    transitioned
}
