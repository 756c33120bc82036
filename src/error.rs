// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Domain failures (unknown user, bad password, inactive token, ...) carry the
//! human-readable message shown to the caller and are folded into result
//! values by the auth service. Everything else propagates as an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Unknown user, role or refresh token.
    #[error("{0}")]
    NotFound(String),

    /// Password mismatch.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Deactivated account, or expired/revoked refresh token.
    #[error("{0}")]
    Inactive(String),

    /// E-mail, user name or role already exists.
    #[error("{0}")]
    Duplicate(String),

    /// Password rejected by the password policy.
    #[error("{0}")]
    InvalidPassword(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Caller-visible classification of a per-request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    InvalidCredentials,
    Inactive,
    Duplicate,
    InvalidPassword,
}

impl AppError {
    /// Unknown or deactivated account; both read the same to the caller.
    pub fn no_account(user_name: &str) -> Self {
        AppError::NotFound(format!("No accounts registered with {}", user_name))
    }

    /// Classify domain failures; `None` for infrastructure errors that must
    /// propagate to the caller.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AppError::NotFound(_) => Some(FailureKind::NotFound),
            AppError::InvalidCredentials(_) => Some(FailureKind::InvalidCredentials),
            AppError::Inactive(_) => Some(FailureKind::Inactive),
            AppError::Duplicate(_) => Some(FailureKind::Duplicate),
            AppError::InvalidPassword(_) => Some(FailureKind::InvalidPassword),
            AppError::InvalidToken | AppError::Database(_) | AppError::Internal(_) => None,
        }
    }
}

impl FailureKind {
    /// HTTP status the request layer should answer with.
    pub fn status_code(self) -> StatusCode {
        match self {
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
            FailureKind::Inactive => StatusCode::FORBIDDEN,
            FailureKind::Duplicate => StatusCode::CONFLICT,
            FailureKind::InvalidPassword => StatusCode::BAD_REQUEST,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::InvalidCredentials(msg) => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                Some(msg.clone()),
            ),
            AppError::Inactive(msg) => (StatusCode::FORBIDDEN, "inactive", Some(msg.clone())),
            AppError::Duplicate(msg) => (StatusCode::CONFLICT, "duplicate", Some(msg.clone())),
            AppError::InvalidPassword(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_password",
                Some(msg.clone()),
            ),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
