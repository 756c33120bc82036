// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HS256 access token issuance and validation.
//!
//! Tokens are standard three-part JWTs so independent middleware holding the
//! same secret, issuer and audience can verify them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::error::AppError;
use crate::models::User;

/// Name claim type understood by identity-framework middleware.
pub const NAME_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";

/// Claim names owned by the signer; user claims cannot override them.
const RESERVED_CLAIMS: [&str; 11] = [
    "sub", "jti", "email", "uid", NAME_CLAIM, "roles", "iss", "aud", "iat", "nbf", "exp",
];

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user name)
    pub sub: String,
    /// Unique token id, fresh for every token
    pub jti: String,
    pub email: String,
    /// User id
    pub uid: String,
    /// User name again, under the identity-framework claim type
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name")]
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Additional claims attached to the user
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Compact `header.payload.signature` form
    pub token: String,
    pub expires: DateTime<Utc>,
    pub claims: Claims,
}

/// Signs and validates access tokens with a symmetric key.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl TokenSigner {
    /// Build a signer from configuration.
    ///
    /// An empty signing key is a configuration error.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if config.jwt_signing_key.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::Empty("JWT_KEY"));
        }
        if config.jwt_duration_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_DURATION_MINUTES",
                value: config.jwt_duration_minutes.to_string(),
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.jwt_signing_key),
            decoding_key: DecodingKey::from_secret(&config.jwt_signing_key),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            lifetime: Duration::minutes(config.jwt_duration_minutes),
        })
    }

    /// Configured access token lifetime in minutes.
    pub fn duration_minutes(&self) -> i64 {
        self.lifetime.num_minutes()
    }

    /// Issue an access token for `user`, carrying its roles and extra claims.
    pub fn issue(&self, user: &User) -> Result<AccessToken, AppError> {
        self.issue_at(user, Utc::now())
    }

    fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<AccessToken, AppError> {
        let expires = now + self.lifetime;

        let extra = user
            .claims
            .iter()
            .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();

        let claims = Claims {
            sub: user.user_name.clone(),
            jti: Uuid::new_v4().to_string(),
            email: user.email.clone(),
            uid: user.id.clone(),
            name: user.user_name.clone(),
            roles: user.roles.iter().cloned().collect(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires.timestamp(),
            extra,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        // Report the expiry at the precision the token actually carries.
        let expires = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires);

        Ok(AccessToken {
            token,
            expires,
            claims,
        })
    }

    /// Verify signature, issuer, audience and lifetime with no clock skew.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "Access token rejected");
                AppError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn test_user() -> User {
        User {
            id: "5f0c6c1e-0000-4000-8000-000000000001".to_string(),
            user_name: "alice".to_string(),
            email: "alice@x.com".to_string(),
            is_active: true,
            is_password_changed: true,
            roles: BTreeSet::from(["admin".to_string(), "user".to_string()]),
            claims: BTreeMap::from([
                ("store".to_string(), "7".to_string()),
                ("sub".to_string(), "mallory".to_string()),
            ]),
            refresh_tokens: Vec::new(),
            version: 0,
        }
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(&Config::test_default()).unwrap()
    }

    #[test]
    fn test_issue_then_validate_roundtrip() {
        let signer = signer();
        let token = signer.issue(&test_user()).unwrap();

        assert_eq!(token.token.split('.').count(), 3);

        let claims = signer.validate(&token.token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.uid, "5f0c6c1e-0000-4000-8000-000000000001");
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.roles, vec!["admin".to_string(), "user".to_string()]);
        assert_eq!(claims.iss, "comptoir-test");
        assert_eq!(claims.aud, "comptoir-clients");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(token.expires.timestamp(), claims.exp);
    }

    #[test]
    fn test_user_claims_cannot_override_reserved() {
        let signer = signer();
        let claims = signer.validate(&signer.issue(&test_user()).unwrap().token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.extra.get("store"), Some(&serde_json::json!("7")));
        assert!(!claims.extra.contains_key("sub"));
    }

    #[test]
    fn test_jti_is_unique() {
        let signer = signer();
        let user = test_user();
        let now = Utc::now();

        let a = signer.issue_at(&user, now).unwrap();
        let b = signer.issue_at(&user, now).unwrap();

        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_token_rejected_without_grace() {
        let signer = signer();
        // Expired two seconds ago; any leeway would still accept it.
        let issued = Utc::now() - Duration::minutes(15) - Duration::seconds(2);
        let token = signer.issue_at(&test_user(), issued).unwrap();

        assert!(matches!(signer.validate(&token.token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_not_yet_valid_token_rejected() {
        let signer = signer();
        let token = signer
            .issue_at(&test_user(), Utc::now() + Duration::minutes(5))
            .unwrap();

        assert!(signer.validate(&token.token).is_err());
    }

    #[test]
    fn test_wrong_key_issuer_or_audience_rejected() {
        let token = signer().issue(&test_user()).unwrap().token;

        let mut other_key = Config::test_default();
        other_key.jwt_signing_key = b"another_key_of_sufficient_length".to_vec();
        assert!(TokenSigner::new(&other_key).unwrap().validate(&token).is_err());

        let mut other_issuer = Config::test_default();
        other_issuer.jwt_issuer = "someone-else".to_string();
        assert!(TokenSigner::new(&other_issuer).unwrap().validate(&token).is_err());

        let mut other_audience = Config::test_default();
        other_audience.jwt_audience = "kiosk".to_string();
        assert!(TokenSigner::new(&other_audience).unwrap().validate(&token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let signer = signer();
        let token = signer.issue(&test_user()).unwrap().token;
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = parts[0].to_string();
        parts[1] = &forged_payload;

        assert!(signer.validate(&parts.join(".")).is_err());
        assert!(signer.validate("invalid.token.here").is_err());
    }

    #[test]
    fn test_empty_key_is_configuration_error() {
        let mut config = Config::test_default();
        config.jwt_signing_key = Vec::new();
        assert!(matches!(
            TokenSigner::new(&config),
            Err(ConfigError::Empty("JWT_KEY"))
        ));
    }
}
