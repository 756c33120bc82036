// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Comptoir auth: identity and session core for the Comptoir point-of-sale
//! backend.
//!
//! Issues short-lived HS256 access tokens and long-lived rotating refresh
//! tokens, and manages registration, passwords, roles and account
//! deactivation on top of a pluggable [`db::CredentialStore`].

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod services;

use config::Config;
use db::{CredentialStore, InMemoryStore};
use services::AuthService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState<S = InMemoryStore> {
    pub config: Config,
    pub auth: AuthService<S>,
}

impl<S: CredentialStore> AppState<S> {
    pub fn new(store: Arc<S>, config: Config) -> Result<Self, config::ConfigError> {
        let auth = AuthService::new(store, config.clone())?;
        Ok(Self { config, auth })
    }
}
