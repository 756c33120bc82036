// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod auth;
pub mod refresh_token;
pub mod role;
pub mod user;

pub use auth::{AuthenticationModel, ResultWithMessage, SessionTokens};
pub use refresh_token::RefreshToken;
pub use role::Role;
pub use user::{NewUser, User, UserProfile};
