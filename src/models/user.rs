// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::RefreshToken;

/// User record as held by the credential store.
///
/// Carries no password hash; hashes never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier (UUID string), never changes
    pub id: String,
    /// Unique login name
    pub user_name: String,
    pub email: String,
    /// Deactivated users cannot authenticate or refresh
    pub is_active: bool,
    /// False when the current password was set by an administrator
    pub is_password_changed: bool,
    /// Assigned role names
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Extra claims copied into every access token
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    /// Append-only refresh token history
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshToken>,
    /// Optimistic concurrency version, bumped by every successful update
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// First refresh token that is still usable at `now`.
    pub fn active_refresh_token(&self, now: DateTime<Utc>) -> Option<&RefreshToken> {
        self.refresh_tokens.iter().find(|t| t.is_active_at(now))
    }

    pub fn refresh_token(&self, token: &str) -> Option<&RefreshToken> {
        self.refresh_tokens.iter().find(|t| t.token == token)
    }

    pub fn refresh_token_mut(&mut self, token: &str) -> Option<&mut RefreshToken> {
        self.refresh_tokens.iter_mut().find(|t| t.token == token)
    }

    /// Revoke every active refresh token; returns how many were revoked.
    pub fn revoke_active_refresh_tokens(&mut self, now: DateTime<Utc>) -> usize {
        let mut revoked = 0;
        for token in self.refresh_tokens.iter_mut().filter(|t| t.is_active_at(now)) {
            token.revoked = Some(now);
            revoked += 1;
        }
        revoked
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub is_password_changed: bool,
}

/// Public view of a user (no credentials, no tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub is_active: bool,
    pub is_password_changed: bool,
    pub roles: Vec<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_password_changed: user.is_password_changed,
            roles: user.roles.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(name: &str, now: DateTime<Utc>, revoked: bool) -> RefreshToken {
        RefreshToken {
            token: name.to_string(),
            created: now,
            expires: now + Duration::days(10),
            revoked: revoked.then_some(now),
        }
    }

    fn user_with_tokens(tokens: Vec<RefreshToken>) -> User {
        User {
            id: "u-1".to_string(),
            user_name: "alice".to_string(),
            email: "alice@x.com".to_string(),
            is_active: true,
            is_password_changed: true,
            roles: BTreeSet::from(["user".to_string()]),
            claims: BTreeMap::new(),
            refresh_tokens: tokens,
            version: 0,
        }
    }

    #[test]
    fn test_active_refresh_token_skips_revoked() {
        let now = Utc::now();
        let user = user_with_tokens(vec![token("a", now, true), token("b", now, false)]);

        assert_eq!(user.active_refresh_token(now).map(|t| t.token.as_str()), Some("b"));
    }

    #[test]
    fn test_revoke_active_refresh_tokens_keeps_history() {
        let now = Utc::now();
        let mut user = user_with_tokens(vec![
            token("a", now, true),
            token("b", now, false),
            token("c", now, false),
        ]);

        assert_eq!(user.revoke_active_refresh_tokens(now), 2);
        assert_eq!(user.refresh_tokens.len(), 3);
        assert!(user.active_refresh_token(now).is_none());
        assert_eq!(user.revoke_active_refresh_tokens(now), 0);
    }

    #[test]
    fn test_profile_has_no_tokens() {
        let now = Utc::now();
        let user = user_with_tokens(vec![token("secret", now, false)]);
        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();

        assert!(json.contains("\"userName\":\"alice\""));
        assert!(!json.contains("secret"));
    }
}
