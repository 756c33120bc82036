// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store backed by concurrent maps.
//!
//! Used for tests and embedding. Every write checks the user's version while
//! holding the shard lock for that user, so read-modify-write cycles from
//! concurrent requests cannot interleave silently.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CredentialStore, StoreError};
use crate::models::{NewUser, Role, User};
use crate::services::password;

/// Credential store held entirely in memory.
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Tables>,
    offline: bool,
}

#[derive(Default)]
struct Tables {
    /// id -> user
    users: DashMap<String, User>,
    /// normalized user name -> id
    user_names: DashMap<String, String>,
    /// normalized e-mail -> id
    emails: DashMap<String, String>,
    /// id -> argon2 PHC string
    password_hashes: DashMap<String, String>,
    /// sha256(token) -> id
    refresh_tokens: DashMap<String, String>,
    /// normalized role name -> role
    roles: DashMap<String, Role>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that fails every call, for exercising error propagation.
    pub fn new_offline() -> Self {
        Self {
            inner: Arc::default(),
            offline: true,
        }
    }

    fn tables(&self) -> Result<&Tables, StoreError> {
        if self.offline {
            return Err(StoreError::Backend(
                "Database not connected (offline mode)".to_string(),
            ));
        }
        Ok(&self.inner)
    }

    fn user_by_key(&self, index: &DashMap<String, String>, key: &str) -> Option<User> {
        let id = index.get(&normalize(key))?.clone();
        self.inner.users.get(&id).map(|u| u.clone())
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Index key for a refresh token; raw token strings are not used as keys.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl CredentialStore for InMemoryStore {
    async fn find_by_username(&self, user_name: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        Ok(self.user_by_key(&tables.user_names, user_name))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        Ok(self.user_by_key(&tables.emails, email))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables()?.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        let Some(id) = tables.refresh_tokens.get(&token_digest(token)).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(tables
            .users
            .get(&id)
            .map(|u| u.clone())
            .filter(|u| u.refresh_token(token).is_some()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let tables = self.tables()?;
        let id = Uuid::new_v4().to_string();
        let name_key = normalize(&new_user.user_name);
        let email_key = normalize(&new_user.email);

        match tables.user_names.entry(name_key.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!(
                    "Username {} is already taken",
                    new_user.user_name
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        match tables.emails.entry(email_key) {
            Entry::Occupied(_) => {
                tables.user_names.remove(&name_key);
                return Err(StoreError::Duplicate(format!(
                    "Email {} is already registered",
                    new_user.email
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let user = User {
            id: id.clone(),
            user_name: new_user.user_name,
            email: new_user.email,
            is_active: true,
            is_password_changed: new_user.is_password_changed,
            roles: Default::default(),
            claims: Default::default(),
            refresh_tokens: Vec::new(),
            version: 0,
        };

        tables.password_hashes.insert(id.clone(), new_user.password_hash);
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let tables = self.tables()?;
        let mut current = tables.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;

        if current.version != user.version {
            return Err(StoreError::Conflict);
        }

        let mut stored = user.clone();
        // Login names are immutable through updates.
        stored.user_name = current.user_name.clone();
        stored.email = current.email.clone();
        stored.version += 1;

        for token in &stored.refresh_tokens {
            tables
                .refresh_tokens
                .entry(token_digest(&token.token))
                .or_insert_with(|| stored.id.clone());
        }

        *current = stored.clone();
        Ok(stored)
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, StoreError> {
        let tables = self.tables()?;
        let Some(hash) = tables.password_hashes.get(user_id).map(|h| h.clone()) else {
            return Ok(false);
        };
        password::verify_password(password, &hash).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: String,
    ) -> Result<(), StoreError> {
        let tables = self.tables()?;
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::NotFound);
        }
        tables.password_hashes.insert(user_id.to_string(), password_hash);
        Ok(())
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.tables()?.roles.get(&normalize(name)).map(|r| r.clone()))
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        let tables = self.tables()?;
        match tables.roles.entry(normalize(name)) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "Role {} already exists",
                name
            ))),
            Entry::Vacant(slot) => {
                let role = Role {
                    id: Uuid::new_v4().to_string(),
                    name: name.trim().to_string(),
                };
                slot.insert(role.clone());
                Ok(role)
            }
        }
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        let tables = self.tables()?;
        let role_name = tables
            .roles
            .get(&normalize(role))
            .map(|r| r.name.clone())
            .ok_or(StoreError::NotFound)?;

        let mut user = tables.users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        if user.roles.insert(role_name) {
            user.version += 1;
        }
        Ok(())
    }
}
