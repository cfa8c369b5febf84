//! Session Entity
//!
//! One authenticated client instance. Sessions are never mutated in place:
//! a refresh yields a new record and the provider invalidates the old token.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{session_token::SessionToken, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    /// Owning principal
    pub user_id: UserId,
    /// Issuance time
    pub created_at: DateTime<Utc>,
    /// Absolute expiry, provider-controlled
    pub expires_at: DateTime<Utc>,
    /// Diagnostic only
    pub ip_address: Option<String>,
    /// Diagnostic only
    pub user_agent: Option<String>,
}

impl Session {
    /// Time elapsed since issuance
    ///
    /// Negative when `created_at` is ahead of `now` (clock skew).
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
