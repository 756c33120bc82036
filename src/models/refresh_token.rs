// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh token record owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long-lived opaque credential exchanged for new access tokens.
///
/// Records are only ever appended to a user and revoked in place; they are
/// never deleted so the history stays auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Base64 of 32 random bytes, unique across all users
    pub token: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// When the token was revoked (None = never)
    pub revoked: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// Not revoked and not yet expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked.is_none() && !self.is_expired_at(now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Lifetime in whole minutes, as reported to clients.
    pub fn duration_minutes(&self) -> i64 {
        (self.expires - self.created).num_minutes()
    }
}
