// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Result shapes returned to the request-handling layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Outcome of an operation that returns no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultWithMessage {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
}

impl ResultWithMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(kind),
        }
    }
}

/// Tokens and identity returned by a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub access_token_duration_minutes: i64,
    pub refresh_token: String,
    pub refresh_token_expiry: DateTime<Utc>,
    pub refresh_token_duration_minutes: i64,
}

/// Outcome of `login` / `refresh_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationModel {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
    #[serde(flatten)]
    pub session: Option<SessionTokens>,
}

impl AuthenticationModel {
    pub fn authenticated(session: SessionTokens) -> Self {
        Self {
            is_authenticated: true,
            message: None,
            error: None,
            session: Some(session),
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            is_authenticated: false,
            message: Some(message.into()),
            error: Some(kind),
            session: None,
        }
    }
}
