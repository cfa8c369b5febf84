//! Session age rules
//!
//! Pure functions of a session, a threshold and an injected `now`.

use chrono::{DateTime, Duration, Utc};

use crate::domain::entity::Session;

fn seconds(secs: i64) -> Duration {
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

/// Whether the session was (re)authenticated recently enough
///
/// A threshold of zero or less disables the requirement. The boundary is
/// inclusive: a session exactly `threshold_secs` old is still fresh.
pub fn is_fresh(session: &Session, threshold_secs: i64, now: DateTime<Utc>) -> bool {
    if threshold_secs <= 0 {
        return true;
    }
    session.age(now) <= seconds(threshold_secs)
}

/// Whether the session is still inside the update-age window
///
/// Inside the window a refresh is a no-op. A window of zero or less is
/// always elapsed: zero means "refresh on every call", it does not fall
/// back to the one-day default (that lives in `AuthConfig::default()`).
pub fn within_update_age(session: &Session, update_age_secs: i64, now: DateTime<Utc>) -> bool {
    if update_age_secs <= 0 {
        return false;
    }
    session.age(now) < seconds(update_age_secs)
}
