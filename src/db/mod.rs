// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: persistence seam for users, roles and refresh tokens.
//!
//! The auth core only talks to [`CredentialStore`]. Updates are optimistic:
//! every [`User`] carries a version and [`CredentialStore::update_user`]
//! rejects stale writes, which is what serializes concurrent refresh and
//! revoke calls against the same user.

pub mod memory;

pub use memory::InMemoryStore;

use std::future::Future;

use crate::error::AppError;
use crate::models::{NewUser, Role, User};

/// Attempts made by [`modify_user`] before giving up on a contended user.
pub const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Storage-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The record changed since it was read.
    #[error("concurrent modification")]
    Conflict,

    #[error("{0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound(err.to_string()),
            StoreError::Duplicate(msg) => AppError::Duplicate(msg),
            StoreError::Conflict | StoreError::Backend(_) => AppError::Database(err.to_string()),
        }
    }
}

/// Persistence operations consumed by the auth core.
///
/// Lookups by user name, e-mail and role name are case-insensitive.
pub trait CredentialStore: Send + Sync {
    fn find_by_username(
        &self,
        user_name: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_by_id(&self, id: &str)
        -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Owner of a refresh token. Token strings are globally unique.
    fn find_by_refresh_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Create an active user with no roles. Fails with `Duplicate` when the
    /// user name is taken.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Persist `user` if its version is current; returns the stored copy with
    /// the bumped version. Stale versions fail with `Conflict`.
    fn update_user(&self, user: &User) -> impl Future<Output = Result<User, StoreError>> + Send;

    fn verify_password(
        &self,
        user_id: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Replace the stored hash. The previous hash stops verifying in the
    /// same step.
    fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: String,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_role(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Role>, StoreError>> + Send;

    /// Fails with `Duplicate` when the role exists.
    fn create_role(&self, name: &str) -> impl Future<Output = Result<Role, StoreError>> + Send;

    /// Add an existing role to an existing user (no-op if already assigned).
    fn assign_role(
        &self,
        user_id: &str,
        role: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Apply `change` to `user` and persist it, re-reading and re-applying on
/// version conflicts.
///
/// `change` may abort by returning an error (for example when a re-read shows
/// a token was revoked by a concurrent request); nothing is written then.
/// A change that leaves the user untouched is not written either.
pub async fn modify_user<S, F, T>(
    store: &S,
    mut user: User,
    mut change: F,
) -> Result<(User, T), AppError>
where
    S: CredentialStore,
    F: FnMut(&mut User) -> Result<T, AppError> + Send,
    T: Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let before = user.clone();
        let outcome = change(&mut user)?;
        if user == before {
            return Ok((user, outcome));
        }

        match store.update_user(&user).await {
            Ok(stored) => return Ok((stored, outcome)),
            Err(StoreError::Conflict) if attempt < MAX_UPDATE_ATTEMPTS => {
                tracing::debug!(user_id = %user.id, attempt, "User changed concurrently, retrying");
                user = store
                    .find_by_id(&user.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("No account with id {}", user.id)))?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::Conflict.into())
}
