use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, Result};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// "access" or "refresh".
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies both token classes. Access and refresh tokens use
/// separate secrets, so one class can never pass verification as the other.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        TokenCodec {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl(&self) -> i64 {
        self.access_ttl
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl
    }

    /// Short-lived bearer token carrying enough identity for request handling
    /// without a database read.
    pub fn issue_access(&self, user_id: Uuid, username: &str, email: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            iat: now,
            exp: now + self.access_ttl,
        };
        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))
    }

    /// Long-lived token used only to mint new access tokens. Carries nothing
    /// beyond the subject.
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            username: None,
            email: None,
            token_type: TOKEN_TYPE_REFRESH.to_string(),
            iat: now,
            exp: now + self.refresh_ttl,
        };
        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign refresh token: {}", e)))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.access_decoding, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.refresh_decoding, TOKEN_TYPE_REFRESH)
    }

    fn verify(&self, token: &str, key: &DecodingKey, expected_type: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, key, &Validation::default()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            }
        })?;
        if data.claims.token_type != expected_type {
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(&JwtConfig {
            access_secret: "access-secret-for-tests".to_string(),
            refresh_secret: "refresh-secret-for-tests".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
        })
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();
        let token = codec
            .issue_access(user_id, "alice", "alice@example.com")
            .unwrap();

        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();
        let token = codec.issue_refresh(user_id).unwrap();

        let claims = codec.verify_refresh(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.token_type, TOKEN_TYPE_REFRESH);
        assert!(claims.username.is_none());
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_token_classes_are_not_interchangeable() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();
        let access = codec
            .issue_access(user_id, "alice", "alice@example.com")
            .unwrap();
        let refresh = codec.issue_refresh(user_id).unwrap();

        assert!(matches!(
            codec.verify_refresh(&access),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            codec.verify_access(&refresh),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Negative lifetime backdates exp past the verifier leeway.
        let codec = TokenCodec::new(&JwtConfig {
            access_secret: "access-secret-for-tests".to_string(),
            refresh_secret: "refresh-secret-for-tests".to_string(),
            access_token_ttl: -120,
            refresh_token_ttl: -120,
        });
        let token = codec
            .issue_access(Uuid::new_v4(), "alice", "alice@example.com")
            .unwrap();
        assert!(matches!(
            codec.verify_access(&token),
            Err(AppError::ExpiredToken)
        ));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let codec = test_codec();
        let token = codec
            .issue_access(Uuid::new_v4(), "alice", "alice@example.com")
            .unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert!(matches!(
            codec.verify_access(&tampered),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let codec = test_codec();
        let other = TokenCodec::new(&JwtConfig {
            access_secret: "a-different-access-secret".to_string(),
            refresh_secret: "a-different-refresh-secret".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
        });
        let token = other
            .issue_access(Uuid::new_v4(), "mallory", "mallory@example.com")
            .unwrap();
        assert!(matches!(
            codec.verify_access(&token),
            Err(AppError::InvalidToken)
        ));
    }
}
