// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{routing::get, Extension, Json, Router};
use chrono::Utc;
use comptoir_auth::config::Config;
use comptoir_auth::db::{CredentialStore, InMemoryStore, StoreError};
use comptoir_auth::middleware::{require_auth, AuthUser};
use comptoir_auth::models::{NewUser, Role, User};
use comptoir_auth::services::AuthService;
use comptoir_auth::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const PASSWORD: &str = "Secret1!";

/// Auth service over a fresh in-memory store.
#[allow(dead_code)]
pub fn test_service() -> AuthService<InMemoryStore> {
    AuthService::new(Arc::new(InMemoryStore::new()), Config::test_default())
        .expect("test config is valid")
}

/// Auth service whose store fails every call.
#[allow(dead_code)]
pub fn test_service_offline() -> AuthService<InMemoryStore> {
    AuthService::new(Arc::new(InMemoryStore::new_offline()), Config::test_default())
        .expect("test config is valid")
}

/// Register `user_name` with [`PASSWORD`] and `<user_name>@x.com`.
#[allow(dead_code)]
pub async fn register<S: CredentialStore>(auth: &AuthService<S>, user_name: &str) {
    let result = auth
        .register(user_name, &format!("{}@x.com", user_name), PASSWORD)
        .await
        .expect("store is online");
    assert!(result.success, "registration failed: {}", result.message);
}

/// Router with one protected route echoing the authenticated caller.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(Arc::new(InMemoryStore::new()), Config::test_default())
            .expect("test config is valid"),
    );

    let app = Router::new()
        .route("/api/me", get(whoami))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth::<InMemoryStore>,
        ))
        .with_state(state.clone());

    (app, state)
}

async fn whoami(Extension(user): Extension<AuthUser>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "userId": user.user_id,
        "userName": user.user_name,
        "email": user.email,
        "roles": user.roles,
    }))
}

/// In-memory store that lets a test interfere with writes.
///
/// - `deactivate_before_update`: the next `update_user` is preceded by an
///   administrator deactivating the same account, so the write conflicts.
/// - `fail_updates`: every `update_user` fails with `Conflict`.
/// - `fail_role_writes`: `create_role` and `assign_role` fail.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct InterferingStore {
    pub inner: InMemoryStore,
    pub deactivate_before_update: Arc<AtomicBool>,
    pub fail_updates: Arc<AtomicBool>,
    pub fail_role_writes: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl InterferingStore {
    fn role_write(&self) -> Result<(), StoreError> {
        if self.fail_role_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("role table unavailable".to_string()));
        }
        Ok(())
    }
}

impl CredentialStore for InterferingStore {
    async fn find_by_username(&self, user_name: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_username(user_name).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_refresh_token(token).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.inner.create_user(new_user).await
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict);
        }
        if self.deactivate_before_update.swap(false, Ordering::SeqCst) {
            if let Some(mut current) = self.inner.find_by_id(&user.id).await? {
                current.is_active = false;
                current.revoke_active_refresh_tokens(Utc::now());
                self.inner.update_user(&current).await?;
            }
        }
        self.inner.update_user(user).await
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, StoreError> {
        self.inner.verify_password(user_id, password).await
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: String,
    ) -> Result<(), StoreError> {
        self.inner.set_password_hash(user_id, password_hash).await
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        self.inner.find_role(name).await
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        self.role_write()?;
        self.inner.create_role(name).await
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        self.role_write()?;
        self.inner.assign_role(user_id, role).await
    }
}

/// Auth service over an [`InterferingStore`]; the store handle is returned
/// so the test can arm its switches.
#[allow(dead_code)]
pub fn interfering_service() -> (AuthService<InterferingStore>, InterferingStore) {
    let store = InterferingStore::default();
    let auth = AuthService::new(Arc::new(store.clone()), Config::test_default())
        .expect("test config is valid");
    (auth, store)
}
