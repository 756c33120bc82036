// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The JWT signing key is the only setting without a fallback: a missing or
//! empty key aborts startup instead of surfacing later as per-request errors.

use std::env;
use std::str::FromStr;

/// Refresh token lifetime used when `REFRESH_TOKEN_DAYS` is not set.
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 10;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Access tokens ---
    /// Symmetric HMAC-SHA256 signing key (raw bytes of the configured secret)
    pub jwt_signing_key: Vec<u8>,
    /// `iss` claim written to and required from access tokens
    pub jwt_issuer: String,
    /// `aud` claim written to and required from access tokens
    pub jwt_audience: String,
    /// Access token lifetime in minutes
    pub jwt_duration_minutes: i64,

    // --- Refresh tokens ---
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,

    // --- Accounts ---
    /// Role assigned to every self-registered user
    pub default_role: String,
    pub password_policy: PasswordPolicy,
    pub password_hashing: HashingParams,
    /// Administrator created by `seed_essentials` (optional)
    pub seed_admin: Option<SeedAdmin>,
}

/// Password complexity rules applied on registration and password changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

/// Argon2id cost parameters used for new password hashes.
///
/// Verification always uses the parameters embedded in the stored PHC string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Bootstrap administrator account.
#[derive(Clone)]
pub struct SeedAdmin {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = required("JWT_KEY")?.into_bytes();

        let seed_admin = match env::var("SEED_ADMIN_USERNAME") {
            Ok(user_name) if !user_name.trim().is_empty() => Some(SeedAdmin {
                user_name: user_name.trim().to_string(),
                email: required("SEED_ADMIN_EMAIL")?,
                password: required("SEED_ADMIN_PASSWORD")?,
            }),
            _ => None,
        };

        Ok(Self {
            jwt_signing_key,
            jwt_issuer: required("JWT_ISSUER")?,
            jwt_audience: required("JWT_AUDIENCE")?,
            jwt_duration_minutes: parsed_or("JWT_DURATION_MINUTES", 60)?,
            refresh_token_days: parsed_or("REFRESH_TOKEN_DAYS", DEFAULT_REFRESH_TOKEN_DAYS)?,
            default_role: env::var("DEFAULT_ROLE")
                .map(|v| v.trim().to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "user".to_string()),
            password_policy: PasswordPolicy {
                min_length: parsed_or("PASSWORD_MIN_LENGTH", 6)?,
                ..PasswordPolicy::default()
            },
            password_hashing: HashingParams {
                memory_kib: parsed_or("ARGON2_MEMORY_KIB", argon2::Params::DEFAULT_M_COST)?,
                iterations: parsed_or("ARGON2_ITERATIONS", argon2::Params::DEFAULT_T_COST)?,
                parallelism: parsed_or("ARGON2_PARALLELISM", argon2::Params::DEFAULT_P_COST)?,
            },
            seed_admin,
        })
    }

    /// Deterministic configuration for tests: fixed key, cheap hashing.
    pub fn test_default() -> Self {
        Self {
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            jwt_issuer: "comptoir-test".to_string(),
            jwt_audience: "comptoir-clients".to_string(),
            jwt_duration_minutes: 15,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
            default_role: "user".to_string(),
            password_policy: PasswordPolicy::default(),
            password_hashing: HashingParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            seed_admin: None,
        }
    }
}

/// Read a required, non-empty variable. Surrounding whitespace is dropped.
fn required(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(value.to_string())
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Environment variable {0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
