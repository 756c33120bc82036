// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token authentication middleware.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the access token for browser clients.
pub const TOKEN_COOKIE: &str = "comptoir_token";

/// Authenticated caller extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Middleware that requires a valid access token.
///
/// The token is read from the `comptoir_token` cookie first, then from an
/// `Authorization: Bearer` header. On success an [`AuthUser`] is added to the
/// request extensions.
pub async fn require_auth<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => token.trim().to_string(),
            None => return Err(AppError::InvalidToken),
        }
    };

    let claims = state.auth.signer().validate(&token)?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.uid,
        user_name: claims.sub,
        email: claims.email,
        roles: claims.roles,
    });

    Ok(next.run(request).await)
}
