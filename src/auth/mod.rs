//! Bearer token authentication
//!
//! Operators exchange directory credentials for a short-lived JWT at
//! `POST /token`; every other non-public route requires it as
//! `Authorization: Bearer <jwt>`.

pub mod middleware;

pub use middleware::{require_bearer, AuthPolicy};

use crate::config::AuthConfig;
use crate::domain::{Result, SyncError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Claims carried by issued tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
}

/// Issues and verifies HMAC-signed JWTs
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl TokenService {
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] for a non-HMAC algorithm.
    pub fn new(secret: &str, algorithm: &str, ttl_minutes: i64) -> Result<Self> {
        let algorithm = Algorithm::from_str(algorithm)
            .ok()
            .filter(|a| matches!(a, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| {
                SyncError::Configuration(format!("Unsupported token algorithm '{algorithm}'"))
            })?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl: Duration::minutes(ttl_minutes),
        })
    }

    /// Token service for the configured key, `None` when no key is set
    pub fn from_config(config: &AuthConfig) -> Result<Option<Self>> {
        match config.secret_key.as_ref() {
            Some(secret) if !secret.expose_secret().is_empty() => Self::new(
                secret.expose_secret().as_ref(),
                &config.algorithm,
                config.token_ttl_minutes,
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    /// Sign a token for `username`
    pub fn issue(&self, username: &str, roles: &[String]) -> Result<String> {
        let claims = Claims {
            sub: username.to_string(),
            roles: roles.to_vec(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| SyncError::Authentication(format!("Failed to sign token: {e}")))
    }

    /// Decode a token, checking signature and expiry
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Authentication`] with `Invalid token: …`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| SyncError::Authentication(format!("Invalid token: {e}")))?;

        if claims.sub.is_empty() {
            return Err(SyncError::Authentication("Invalid token".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new("signing-key", "HS384", 60).unwrap();
        let token = tokens.issue("alice", &["Admin".to_string()]).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["Admin"]);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let issuer = TokenService::new("key-a", "HS256", 60).unwrap();
        let verifier = TokenService::new("key-b", "HS256", 60).unwrap();
        let token = issuer.issue("alice", &[]).unwrap();

        let err = verifier.verify(&token).unwrap_err();
        assert!(err.to_string().contains("Invalid token: "));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = TokenService::new("signing-key", "HS256", -5).unwrap();
        let token = tokens.issue("alice", &[]).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        assert!(TokenService::new("k", "RS256", 60).is_err());
        assert!(TokenService::new("k", "nope", 60).is_err());
    }

    #[test]
    fn test_from_config_without_key() {
        let config = AuthConfig::default();
        assert!(TokenService::from_config(&config).unwrap().is_none());
    }
}
