// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - authentication logic layer.

pub mod auth;
pub mod password;
pub mod refresh_ledger;
pub mod token_signer;

pub use auth::{AuthService, SeedReport};
pub use refresh_ledger::RefreshTokenLedger;
pub use token_signer::{AccessToken, Claims, TokenSigner, NAME_CLAIM};
