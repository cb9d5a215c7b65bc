//! Access token service.
//!
//! Issues and verifies the HS256 tokens used by both the HTTP auth
//! middleware and the WebSocket handshake.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quickpoll_common::{AppError, AppResult, Config};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user ID.
    pub sub: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Token service for issuing and verifying access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenService {
    /// Create a new token service.
    #[must_use]
    pub fn new(secret: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::minutes(expiry_minutes),
        }
    }

    /// Create a token service from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.auth.secret_key, config.auth.token_expiry_minutes)
    }

    /// Issue a token for a user.
    pub fn issue(&self, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// Any failure (malformed, bad signature, expired) is
    /// [`AppError::Unauthorized`]; a connection is never admitted with a
    /// null identity.
    pub fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = TokenService::new("test-secret-key", 30);

        let token = service.issue("u1").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, "u1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative expiry puts exp well past the default leeway
        let service = TokenService::new("test-secret-key", -5);

        let token = service.issue("u1").unwrap();
        let result = service.verify(&token);

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = TokenService::new("test-secret-key", 30);

        let result = service.verify("not.a.token");
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenService::new("secret-a", 30);
        let verifier = TokenService::new("secret-b", 30);

        let token = issuer.issue("u1").unwrap();
        let result = verifier.verify(&token);

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
