//! License expiry policy.
//!
//! Expiry is a derived state, not a stored transition: a rental license stops
//! authorizing access the instant its window elapses, with no deactivation
//! step. Every authorization path (activation, verification, artifact
//! generation) calls through here rather than caching a result.

use chrono::Utc;

use crate::models::License;

/// Whether a license authorizes access at `now` (unix seconds).
pub fn is_valid_at(license: &License, now: i64) -> bool {
    license.is_active && license.expires_at.is_none_or(|exp| now < exp)
}

/// Whether a license authorizes access right now.
pub fn is_valid(license: &License) -> bool {
    is_valid_at(license, Utc::now().timestamp())
}
