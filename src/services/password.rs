// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing (Argon2id, PHC strings) and password policy checks.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use ring::rand::{SecureRandom, SystemRandom};

use crate::config::{HashingParams, PasswordPolicy};
use crate::error::AppError;

const SALT_LEN: usize = 16;

/// Hash `password` with Argon2id using fresh random salt.
pub fn hash_password(password: &str, params: &HashingParams) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt_bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Salt encoding failed: {}", e)))?;

    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid argon2 parameters: {}", e)))?;

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Verify `password` against a stored PHC hash.
///
/// `Ok(false)` on mismatch; an error only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Reject passwords that do not satisfy `policy`, listing every unmet rule.
pub fn check_policy(password: &str, policy: &PasswordPolicy) -> Result<(), AppError> {
    let mut problems = Vec::new();

    if password.chars().count() < policy.min_length {
        problems.push(format!(
            "Passwords must be at least {} characters.",
            policy.min_length
        ));
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Passwords must have at least one digit ('0'-'9').".to_string());
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        problems.push("Passwords must have at least one lowercase ('a'-'z').".to_string());
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        problems.push("Passwords must have at least one uppercase ('A'-'Z').".to_string());
    }
    if policy.require_non_alphanumeric && password.chars().all(|c| c.is_alphanumeric()) {
        problems.push("Passwords must have at least one non alphanumeric character.".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidPassword(problems.join(" ")))
    }
}
