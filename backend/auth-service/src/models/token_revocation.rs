use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which class of token a ledger entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RevocationReason {
    Logout,
    Rotation,
    Revoked,
}

/// One invalidated token. `token_hash` is the SHA-256 hex digest of the raw
/// token, so the ledger itself never holds usable credentials.
#[derive(Debug, Clone, FromRow)]
pub struct RevokedToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub token_type: TokenKind,
    pub reason: RevocationReason,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
