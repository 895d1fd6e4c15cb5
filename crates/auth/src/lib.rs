//! Bearer token handling for the relay.
//!
//! Tokens are HS256 JWTs carrying the sender identity in `sub`. The relay
//! only verifies them; [`JwtManager::issue_token`] exists so development
//! setups and tests can mint tokens without a separate identity service.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use parlor_config::AuthConfig;

/// Upper bound on configured token lifetimes (ten years).
const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("token has no subject")]
    MissingSubject,
    #[error("failed to create token: {0}")]
    TokenCreation(String),
}

/// Claims carried by relay tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

/// Signs and verifies relay tokens with a shared secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    token_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            token_ttl: Duration::hours(24),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let ttl = config.token_ttl_seconds.min(MAX_TOKEN_TTL_SECONDS) as i64;
        Self::new(&config.jwt_secret, &config.issuer, &config.audience)
            .with_ttl(Duration::seconds(ttl))
    }

    /// Set custom token lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Mint a token for `subject`.
    pub fn issue_token(&self, subject: &str) -> Result<String, AuthError> {
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| AuthError::TokenCreation("token lifetime overflows".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::TokenCreation(err.to_string()))
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
            debug!(error = %err, "token rejected");
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(err.to_string()),
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(data.claims)
    }

    /// Validate a token and return only its subject.
    pub fn subject(&self, token: &str) -> Result<String, AuthError> {
        self.verify(token).map(|claims| claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test_secret_key_that_is_long_enough", "parlor", "parlor-clients")
    }

    #[test]
    fn issued_token_round_trips_subject() {
        let jwt = manager();
        let token = jwt.issue_token("u1").unwrap();

        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.iss, "parlor");
        assert_eq!(claims.aud, "parlor-clients");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn blank_subject_cannot_be_issued() {
        assert!(matches!(
            manager().issue_token("  "),
            Err(AuthError::MissingSubject)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            manager().verify("invalid.jwt.token"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
