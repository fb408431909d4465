//! Session tokens — HS256 JWTs issued on login and checked on `/me` routes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::account::{Account, Role};
use crate::error::AuthError;

const ISSUER: &str = "bolsa-auth";

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account ID.
    pub sub: String,
    pub email: String,
    pub role: Option<Role>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued session token.
#[derive(Debug, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signing and verification keys for session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a session for `account`, valid from `now` for the configured TTL.
    pub fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: account.id.clone(),
            email: account.email.clone(),
            role: account.role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Crypto(format!("session signing failed: {e}")))?;

        Ok(SessionToken { token, expires_at })
    }

    /// Verify signature, issuer and expiry of a session token.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::SessionExpired,
                _ => {
                    tracing::debug!("Session token rejected: {e}");
                    AuthError::Unauthorized
                }
            })
    }
}
