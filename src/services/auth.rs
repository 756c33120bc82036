// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth service: login, refresh, revocation, registration, password and role
//! administration.
//!
//! Each operation is a short independent transaction against the credential
//! store. Domain failures come back as result values (`success = false` plus a
//! message); only store and infrastructure failures are returned as `Err`.

use chrono::Utc;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::db::{modify_user, CredentialStore, StoreError};
use crate::error::AppError;
use crate::models::role::{ADMIN_ROLE, ESSENTIAL_ROLES};
use crate::models::{
    AuthenticationModel, NewUser, RefreshToken, ResultWithMessage, SessionTokens, User,
    UserProfile,
};
use crate::services::password;
use crate::services::refresh_ledger::{RefreshTokenLedger, TOKEN_INACTIVE};
use crate::services::token_signer::{AccessToken, TokenSigner};

/// What `seed_essentials` created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: Vec<String>,
    pub admin_created: bool,
}

/// Authentication and session-lifecycle orchestrator.
///
/// Holds no per-request state; share it behind an `Arc` across requests.
pub struct AuthService<S> {
    store: Arc<S>,
    signer: TokenSigner,
    ledger: RefreshTokenLedger<S>,
    config: Config,
}

impl<S: CredentialStore> AuthService<S> {
    /// Build the service. Fails on missing signing configuration or an
    /// out-of-range token lifetime.
    pub fn new(store: Arc<S>, config: Config) -> Result<Self, ConfigError> {
        let signer = TokenSigner::new(&config)?;
        let ledger = RefreshTokenLedger::new(store.clone(), config.refresh_token_days)?;
        Ok(Self {
            store,
            signer,
            ledger,
            config,
        })
    }

    /// Signer for validating access tokens in the request layer.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ─── Registration ────────────────────────────────────────────

    /// Register an active user with the default role. Does not log in.
    pub async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_register(user_name, email, password).await)
    }

    async fn try_register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AppError> {
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AppError::Duplicate(format!("Email {} is already registered", email)));
        }
        password::check_policy(password, &self.config.password_policy)?;

        // Before the user exists, so a role failure leaves nothing behind.
        self.ensure_role(&self.config.default_role).await?;

        let password_hash = password::hash_password(password, &self.config.password_hashing)?;
        let user = self
            .store
            .create_user(NewUser {
                user_name: user_name.trim().to_string(),
                email: email.trim().to_string(),
                password_hash,
                is_password_changed: true,
            })
            .await?;
        self.store.assign_role(&user.id, &self.config.default_role).await?;

        tracing::info!(user_id = %user.id, user_name = %user.user_name, "User registered");
        Ok(format!("User {} has been registered!", user.user_name))
    }

    // ─── Sessions ────────────────────────────────────────────────

    /// Authenticate with user name and password.
    ///
    /// Reuses an active refresh token when the user already holds one.
    pub async fn login(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<AuthenticationModel, AppError> {
        authentication(self.try_login(user_name, password).await)
    }

    async fn try_login(&self, user_name: &str, password: &str) -> Result<SessionTokens, AppError> {
        let user = self.active_user_by_name(user_name).await?;
        self.check_password(&user, password).await?;

        let (user, refresh) = self.ledger.reuse_or_issue(user).await?;
        let access = self.signer.issue(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(self.session(&user, access, refresh))
    }

    /// Exchange a refresh token for a new access token, always rotating the
    /// refresh token. Replaying a rotated token fails as inactive.
    pub async fn refresh_token(&self, token: &str) -> Result<AuthenticationModel, AppError> {
        authentication(self.try_refresh(token).await)
    }

    async fn try_refresh(&self, token: &str) -> Result<SessionTokens, AppError> {
        let user = self.ledger.find_owner(token).await?;
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Refresh attempted for deactivated account");
            return Err(AppError::Inactive(TOKEN_INACTIVE.to_string()));
        }

        let (user, refresh) = self.ledger.rotate(user, token).await?;
        let access = self.signer.issue(&user)?;

        Ok(self.session(&user, access, refresh))
    }

    /// Revoke one refresh token. Revoking an already revoked token succeeds.
    pub async fn revoke_token(&self, token: &str) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_revoke(token).await)
    }

    async fn try_revoke(&self, token: &str) -> Result<String, AppError> {
        let user = self.ledger.find_owner(token).await?;
        if self.ledger.revoke(user, token).await? {
            Ok("Refresh token revoked.".to_string())
        } else {
            Ok("Refresh token was already revoked.".to_string())
        }
    }

    /// Revoke every active refresh token of a user.
    pub async fn revoke_all_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_revoke_all(user_id).await)
    }

    async fn try_revoke_all(&self, user_id: &str) -> Result<String, AppError> {
        let user = self.user_by_id(user_id).await?;
        let (user, revoked) = self.ledger.revoke_all(user).await?;
        Ok(format!("Revoked {} refresh token(s) for {}", revoked, user.user_name))
    }

    /// Deactivate an account and revoke all of its refresh tokens.
    pub async fn deactivate_account(&self, user_id: &str) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_deactivate(user_id).await)
    }

    async fn try_deactivate(&self, user_id: &str) -> Result<String, AppError> {
        let user = self.user_by_id(user_id).await?;
        let now = Utc::now();
        let (user, revoked) = modify_user(self.store.as_ref(), user, |user| {
            user.is_active = false;
            Ok(user.revoke_active_refresh_tokens(now))
        })
        .await?;

        tracing::info!(user_id = %user.id, revoked, "Account deactivated");
        Ok(format!("Account {} deactivated", user.user_name))
    }

    // ─── Passwords ───────────────────────────────────────────────

    /// Change a password after verifying the current one.
    ///
    /// Outstanding refresh tokens are revoked.
    pub async fn change_password(
        &self,
        user_name: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<ResultWithMessage, AppError> {
        outcome(
            self.try_change_password(user_name, current_password, new_password)
                .await,
        )
    }

    async fn try_change_password(
        &self,
        user_name: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, AppError> {
        let user = self.active_user_by_name(user_name).await?;
        self.check_password(&user, current_password).await?;

        let user = self.replace_password(user, new_password, true).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(format!("Password changed for {}", user.user_name))
    }

    /// Administrative reset: no current-password check. The user is flagged
    /// to choose a new password and outstanding refresh tokens are revoked.
    pub async fn reset_password(
        &self,
        user_name: &str,
        new_password: &str,
    ) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_reset_password(user_name, new_password).await)
    }

    async fn try_reset_password(
        &self,
        user_name: &str,
        new_password: &str,
    ) -> Result<String, AppError> {
        let user = self
            .store
            .find_by_username(user_name)
            .await?
            .ok_or_else(|| AppError::no_account(user_name))?;

        let user = self.replace_password(user, new_password, false).await?;
        tracing::info!(user_id = %user.id, "Password reset");
        Ok(format!("Password reset for {}", user.user_name))
    }

    /// Revoke sessions and set the flag, then install the new hash.
    ///
    /// The hash goes in last: if the versioned update fails, the old password
    /// is still the valid one. A self-service change (`self_chosen`) also
    /// stops if a re-read shows the account was deactivated.
    async fn replace_password(
        &self,
        user: User,
        new_password: &str,
        self_chosen: bool,
    ) -> Result<User, AppError> {
        password::check_policy(new_password, &self.config.password_policy)?;
        let hash = password::hash_password(new_password, &self.config.password_hashing)?;

        let now = Utc::now();
        let (user, revoked) = modify_user(self.store.as_ref(), user, |user| {
            if self_chosen && !user.is_active {
                return Err(AppError::no_account(&user.user_name));
            }
            user.is_password_changed = self_chosen;
            Ok(user.revoke_active_refresh_tokens(now))
        })
        .await?;

        self.store.set_password_hash(&user.id, hash).await?;

        if revoked > 0 {
            tracing::info!(
                user_id = %user.id,
                revoked,
                "Revoked refresh tokens after password change"
            );
        }
        Ok(user)
    }

    // ─── Roles ───────────────────────────────────────────────────

    /// Create a role; fails if one with that name already exists.
    pub async fn add_role(&self, name: &str) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_add_role(name).await)
    }

    async fn try_add_role(&self, name: &str) -> Result<String, AppError> {
        let name = name.trim();
        if self.store.find_role(name).await?.is_some() {
            return Err(AppError::Duplicate(format!("Role {} already exists", name)));
        }
        let role = self.store.create_role(name).await?;

        tracing::info!(role = %role.name, "Role created");
        Ok(format!("Role {} has been created", role.name))
    }

    /// Assign an existing role to an existing user.
    pub async fn add_user_to_role(
        &self,
        user_name: &str,
        role: &str,
    ) -> Result<ResultWithMessage, AppError> {
        outcome(self.try_add_user_to_role(user_name, role).await)
    }

    async fn try_add_user_to_role(&self, user_name: &str, role: &str) -> Result<String, AppError> {
        let user = self
            .store
            .find_by_username(user_name)
            .await?
            .ok_or_else(|| AppError::no_account(user_name))?;
        let role = self
            .store
            .find_role(role)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} does not exist", role)))?;

        if user.has_role(&role.name) {
            return Ok(format!("User {} already has role {}", user.user_name, role.name));
        }
        self.store.assign_role(&user.id, &role.name).await?;

        tracing::info!(user_id = %user.id, role = %role.name, "Role assigned");
        Ok(format!("Role {} assigned to {}", role.name, user.user_name))
    }

    // ─── Lookup & bootstrap ──────────────────────────────────────

    pub async fn get_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self
            .store
            .find_by_id(user_id)
            .await?
            .map(|user| UserProfile::from(&user)))
    }

    /// Create the essential roles and the configured administrator if they do
    /// not exist yet. Safe to run repeatedly.
    pub async fn seed_essentials(&self) -> Result<SeedReport, AppError> {
        let mut report = SeedReport::default();

        let default_role = self.config.default_role.as_str();
        let mut roles: Vec<&str> = ESSENTIAL_ROLES.to_vec();
        if !roles.iter().any(|r| r.eq_ignore_ascii_case(default_role)) {
            roles.push(default_role);
        }
        for role in roles {
            if self.ensure_role(role).await? {
                report.roles_created.push(role.to_string());
            }
        }

        if let Some(admin) = &self.config.seed_admin {
            if self.store.find_by_username(&admin.user_name).await?.is_none() {
                password::check_policy(&admin.password, &self.config.password_policy)?;
                let password_hash =
                    password::hash_password(&admin.password, &self.config.password_hashing)?;
                let user = self
                    .store
                    .create_user(NewUser {
                        user_name: admin.user_name.clone(),
                        email: admin.email.clone(),
                        password_hash,
                        is_password_changed: false,
                    })
                    .await?;
                self.store.assign_role(&user.id, ADMIN_ROLE).await?;
                self.store.assign_role(&user.id, default_role).await?;

                tracing::info!(user_id = %user.id, "Seeded administrator account");
                report.admin_created = true;
            }
        }

        Ok(report)
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// Create `name` unless it exists; returns whether it was created.
    async fn ensure_role(&self, name: &str) -> Result<bool, AppError> {
        if self.store.find_role(name).await?.is_some() {
            return Ok(false);
        }
        match self.store.create_role(name).await {
            Ok(role) => {
                tracing::info!(role = %role.name, "Role created");
                Ok(true)
            }
            // Created concurrently.
            Err(StoreError::Duplicate(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Active user by name; deactivated accounts look exactly like unknown ones.
    async fn active_user_by_name(&self, user_name: &str) -> Result<User, AppError> {
        match self.store.find_by_username(user_name).await? {
            Some(user) if user.is_active => Ok(user),
            Some(user) => {
                tracing::warn!(user_id = %user.id, "Rejected request for deactivated account");
                Err(AppError::no_account(user_name))
            }
            None => Err(AppError::no_account(user_name)),
        }
    }

    async fn user_by_id(&self, user_id: &str) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No account with id {}", user_id)))
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<(), AppError> {
        if self.store.verify_password(&user.id, password).await? {
            return Ok(());
        }
        tracing::warn!(user_id = %user.id, "Incorrect password");
        Err(AppError::InvalidCredentials(format!(
            "Incorrect credentials for user {}.",
            user.user_name
        )))
    }

    fn session(&self, user: &User, access: AccessToken, refresh: RefreshToken) -> SessionTokens {
        SessionTokens {
            email: user.email.clone(),
            username: user.user_name.clone(),
            roles: user.roles.iter().cloned().collect(),
            access_token: access.token,
            access_token_expiry: access.expires,
            access_token_duration_minutes: self.signer.duration_minutes(),
            refresh_token_duration_minutes: refresh.duration_minutes(),
            refresh_token: refresh.token,
            refresh_token_expiry: refresh.expires,
        }
    }
}

/// Fold domain failures into a result value; propagate the rest.
fn outcome(result: Result<String, AppError>) -> Result<ResultWithMessage, AppError> {
    match result {
        Ok(message) => Ok(ResultWithMessage::ok(message)),
        Err(err) => match err.failure_kind() {
            Some(kind) => Ok(ResultWithMessage::failed(kind, err.to_string())),
            None => Err(err),
        },
    }
}

fn authentication(
    result: Result<SessionTokens, AppError>,
) -> Result<AuthenticationModel, AppError> {
    match result {
        Ok(session) => Ok(AuthenticationModel::authenticated(session)),
        Err(err) => match err.failure_kind() {
            Some(kind) => Ok(AuthenticationModel::failed(kind, err.to_string())),
            None => Err(err),
        },
    }
}
