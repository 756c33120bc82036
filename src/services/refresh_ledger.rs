// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh token ledger: creation, reuse, rotation and revocation.
//!
//! Every mutation goes through [`modify_user`], so a token that two requests
//! try to rotate at the same time is rotated once; the loser re-reads the user,
//! sees the token revoked and fails with `Inactive`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

use crate::config::ConfigError;
use crate::db::{modify_user, CredentialStore};
use crate::error::AppError;
use crate::models::{RefreshToken, User};

/// Random bytes per refresh token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Longest accepted refresh token lifetime.
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 3650;

pub const TOKEN_NOT_FOUND: &str = "Token did not match any users.";
pub const TOKEN_INACTIVE: &str = "Token not active.";

/// Manages the refresh tokens held by users of a credential store.
pub struct RefreshTokenLedger<S> {
    store: Arc<S>,
    lifetime: Duration,
    rng: SystemRandom,
}

impl<S: CredentialStore> RefreshTokenLedger<S> {
    /// Build a ledger issuing tokens valid for `lifetime_days`.
    ///
    /// The lifetime must be between 1 and [`MAX_REFRESH_TOKEN_DAYS`] days.
    pub fn new(store: Arc<S>, lifetime_days: i64) -> Result<Self, ConfigError> {
        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&lifetime_days) {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_DAYS",
                value: lifetime_days.to_string(),
            });
        }

        Ok(Self {
            store,
            lifetime: Duration::days(lifetime_days),
            rng: SystemRandom::new(),
        })
    }

    /// Mint a new token from the system CSPRNG, valid from now.
    pub fn generate(&self) -> Result<RefreshToken, AppError> {
        self.generate_at(Utc::now())
    }

    fn generate_at(&self, now: DateTime<Utc>) -> Result<RefreshToken, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

        Ok(RefreshToken {
            token: BASE64.encode(bytes),
            created: now,
            expires: now + self.lifetime,
            revoked: None,
        })
    }

    /// The user holding `token`.
    pub async fn find_owner(&self, token: &str) -> Result<User, AppError> {
        self.store
            .find_by_refresh_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.to_string()))
    }

    /// Return one of the user's active tokens, or append and persist a new
    /// one when none is active.
    ///
    /// Fails with `NotFound` if a re-read shows the account was deactivated
    /// meanwhile.
    pub async fn reuse_or_issue(&self, user: User) -> Result<(User, RefreshToken), AppError> {
        if !user.is_active {
            return Err(AppError::no_account(&user.user_name));
        }
        let now = Utc::now();
        if let Some(active) = user.active_refresh_token(now).cloned() {
            tracing::debug!(user_id = %user.id, "Reusing active refresh token");
            return Ok((user, active));
        }

        let fresh = self.generate_at(now)?;
        let (user, token) = modify_user(self.store.as_ref(), user, |user| {
            if !user.is_active {
                return Err(AppError::no_account(&user.user_name));
            }
            // A concurrent login may have appended one meanwhile.
            if let Some(active) = user.active_refresh_token(now) {
                return Ok(active.clone());
            }
            user.refresh_tokens.push(fresh.clone());
            Ok(fresh.clone())
        })
        .await?;

        tracing::info!(user_id = %user.id, "Issued refresh token");
        Ok((user, token))
    }

    /// Revoke `presented` and append its replacement.
    ///
    /// Fails with `NotFound` if the user does not hold the token and with
    /// `Inactive` if it is expired or already revoked, or the account was
    /// deactivated.
    pub async fn rotate(
        &self,
        user: User,
        presented: &str,
    ) -> Result<(User, RefreshToken), AppError> {
        let fresh = self.generate()?;
        let now = fresh.created;

        let (user, token) = modify_user(self.store.as_ref(), user, |user| {
            if !user.is_active {
                return Err(AppError::Inactive(TOKEN_INACTIVE.to_string()));
            }
            let current = user
                .refresh_token_mut(presented)
                .ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.to_string()))?;
            if !current.is_active_at(now) {
                return Err(AppError::Inactive(TOKEN_INACTIVE.to_string()));
            }
            current.revoked = Some(now);
            user.refresh_tokens.push(fresh.clone());
            Ok(fresh.clone())
        })
        .await?;

        tracing::info!(user_id = %user.id, "Rotated refresh token");
        Ok((user, token))
    }

    /// Revoke a single token. Returns `false` if it was already revoked.
    pub async fn revoke(&self, user: User, token: &str) -> Result<bool, AppError> {
        let already_revoked = user
            .refresh_token(token)
            .ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.to_string()))?
            .revoked
            .is_some();
        if already_revoked {
            return Ok(false);
        }

        let now = Utc::now();
        let (user, newly_revoked) = modify_user(self.store.as_ref(), user, |user| {
            let current = user
                .refresh_token_mut(token)
                .ok_or_else(|| AppError::NotFound(TOKEN_NOT_FOUND.to_string()))?;
            if current.revoked.is_some() {
                return Ok(false);
            }
            current.revoked = Some(now);
            Ok(true)
        })
        .await?;

        if newly_revoked {
            tracing::info!(user_id = %user.id, "Revoked refresh token");
        }
        Ok(newly_revoked)
    }

    /// Revoke every active token of the user; returns the updated user and
    /// how many tokens were revoked.
    pub async fn revoke_all(&self, user: User) -> Result<(User, usize), AppError> {
        let now = Utc::now();
        if user.active_refresh_token(now).is_none() {
            return Ok((user, 0));
        }

        let (user, revoked) = modify_user(self.store.as_ref(), user, |user| {
            Ok(user.revoke_active_refresh_tokens(now))
        })
        .await?;

        tracing::info!(user_id = %user.id, revoked, "Revoked refresh tokens");
        Ok((user, revoked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::NewUser;

    async fn setup() -> (Arc<InMemoryStore>, RefreshTokenLedger<InMemoryStore>, User) {
        let store = Arc::new(InMemoryStore::new());
        let ledger = RefreshTokenLedger::new(store.clone(), 10).unwrap();
        let user = store
            .create_user(NewUser {
                user_name: "alice".to_string(),
                email: "alice@x.com".to_string(),
                password_hash: "unused".to_string(),
                is_password_changed: true,
            })
            .await
            .unwrap();
        (store, ledger, user)
    }

    #[tokio::test]
    async fn test_generate_has_256_bits_and_ten_day_expiry() {
        let (_, ledger, _) = setup().await;
        let token = ledger.generate().unwrap();

        assert_eq!(BASE64.decode(&token.token).unwrap().len(), 32);
        assert_eq!(token.expires - token.created, Duration::days(10));
        assert!(token.revoked.is_none());
        assert_ne!(ledger.generate().unwrap().token, token.token);
    }

    #[tokio::test]
    async fn test_reuse_or_issue_reuses_active_token() {
        let (store, ledger, user) = setup().await;

        let (user, first) = ledger.reuse_or_issue(user).await.unwrap();
        let (_, second) = ledger.reuse_or_issue(user.clone()).await.unwrap();

        assert_eq!(first.token, second.token);
        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_tokens.len(), 1);
    }

    #[tokio::test]
    async fn test_reuse_or_issue_skips_expired_tokens() {
        let (_, ledger, user) = setup().await;
        let (mut user, first) = ledger.reuse_or_issue(user).await.unwrap();

        // Age the stored token past its expiry.
        user.refresh_tokens[0].expires = Utc::now() - Duration::seconds(1);
        let user = ledger.store.update_user(&user).await.unwrap();

        let (user, second) = ledger.reuse_or_issue(user).await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(user.refresh_tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_rotate_revokes_and_appends() {
        let (_, ledger, user) = setup().await;
        let (user, original) = ledger.reuse_or_issue(user).await.unwrap();

        let (user, rotated) = ledger.rotate(user, &original.token).await.unwrap();

        assert_ne!(rotated.token, original.token);
        assert_eq!(user.refresh_tokens.len(), 2);
        assert!(user.refresh_token(&original.token).unwrap().revoked.is_some());
        assert!(user.refresh_token(&rotated.token).unwrap().is_active());

        let replay = ledger.rotate(user, &original.token).await;
        assert!(matches!(replay, Err(AppError::Inactive(_))));
    }

    #[tokio::test]
    async fn test_rotate_with_stale_copy_fails_inactive() {
        let (_, ledger, user) = setup().await;
        let (user, original) = ledger.reuse_or_issue(user).await.unwrap();
        let stale = user.clone();

        ledger.rotate(user, &original.token).await.unwrap();

        // The stale copy still shows the token active; the store must not.
        let second = ledger.rotate(stale, &original.token).await;
        assert!(matches!(second, Err(AppError::Inactive(_))));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (_, ledger, user) = setup().await;
        let (user, token) = ledger.reuse_or_issue(user).await.unwrap();

        assert!(ledger.revoke(user, &token.token).await.unwrap());
        let owner = ledger.find_owner(&token.token).await.unwrap();
        assert!(!ledger.revoke(owner, &token.token).await.unwrap());
    }

    #[test]
    fn test_lifetime_must_be_in_range() {
        let store = Arc::new(InMemoryStore::new());
        for days in [0, -1, MAX_REFRESH_TOKEN_DAYS + 1, i64::MAX] {
            assert!(matches!(
                RefreshTokenLedger::new(store.clone(), days),
                Err(ConfigError::Invalid { name: "REFRESH_TOKEN_DAYS", .. })
            ));
        }
        assert!(RefreshTokenLedger::new(store, 1).is_ok());
    }

    #[tokio::test]
    async fn test_rotate_rejects_deactivated_account() {
        let (_, ledger, user) = setup().await;
        let (mut user, token) = ledger.reuse_or_issue(user).await.unwrap();

        // Deactivated without revoking, so only the account check can refuse.
        user.is_active = false;
        let user = ledger.store.update_user(&user).await.unwrap();

        let result = ledger.rotate(user, &token.token).await;
        assert!(matches!(result, Err(AppError::Inactive(_))));
    }

    #[tokio::test]
    async fn test_reuse_or_issue_rejects_deactivated_account() {
        let (_, ledger, mut user) = setup().await;
        user.is_active = false;
        let user = ledger.store.update_user(&user).await.unwrap();

        let result = ledger.reuse_or_issue(user).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_owner_unknown_token() {
        let (_, ledger, _) = setup().await;
        assert!(matches!(
            ledger.find_owner("bm90LWEtdG9rZW4=").await,
            Err(AppError::NotFound(_))
        ));
    }
}
