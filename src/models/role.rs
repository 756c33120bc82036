// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role model.

use serde::{Deserialize, Serialize};

/// Administrative role.
pub const ADMIN_ROLE: &str = "admin";
/// Role every self-registered user receives by default.
pub const USER_ROLE: &str = "user";

/// Roles created by `AuthService::seed_essentials`.
pub const ESSENTIAL_ROLES: [&str; 2] = [ADMIN_ROLE, USER_ROLE];

/// Named role. Role names are unique (case-insensitive); there is no hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}
