use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::token_revocation::{RevocationReason, RevokedToken, TokenKind};

/// Ledger key for a raw token. Only the digest is stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Record a token as revoked. Re-revoking the same token refreshes the
/// existing row instead of failing on the hash uniqueness constraint.
pub async fn revoke_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    token_type: TokenKind,
    reason: RevocationReason,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO revoked_tokens (id, user_id, token_hash, token_type, reason, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (token_hash) DO UPDATE \
         SET reason = EXCLUDED.reason, expires_at = EXCLUDED.expires_at, revoked_at = NOW()",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(token_type)
    .bind(reason)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// True if the hash has a live ledger entry. Entries whose expiry has passed
/// do not count; the token is already dead on its own.
pub async fn is_token_revoked(pool: &PgPool, token_hash: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM revoked_tokens WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(token_hash)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn find_by_hash(pool: &PgPool, token_hash: &str) -> Result<Option<RevokedToken>> {
    let entry = sqlx::query_as::<_, RevokedToken>(
        "SELECT id, user_id, token_hash, token_type, reason, expires_at, revoked_at, created_at \
         FROM revoked_tokens WHERE token_hash = $1",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(entry)
}

/// Delete entries whose expiry has passed. Returns how many were removed.
pub async fn cleanup_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_deterministic() {
        let first = hash_token("some.jwt.token");
        let second = hash_token("some.jwt.token");
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_token_is_64_hex_chars() {
        let hash = hash_token("some.jwt.token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_tokens_hash_differently() {
        assert_ne!(hash_token("token-one"), hash_token("token-two"));
    }
}
