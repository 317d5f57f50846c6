use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::token_revocation::{RevocationReason, TokenKind};
use crate::models::user::{User, UserRole};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_verified, is_blocked, \
     is_deleted, deleted_by, verify_otp, verify_otp_expires, reset_otp, reset_otp_expires, \
     refresh_token, refresh_token_expires, created_at, updated_at";

/// Insert a new account together with its first verification code. The
/// uniqueness pre-check and the insert run in one transaction; a concurrent
/// duplicate that slips past the pre-check still surfaces as a conflict via
/// the unique constraints.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    verify_otp: &str,
    verify_otp_expires: DateTime<Utc>,
) -> Result<User> {
    let mut tx = pool.begin().await?;

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR LOWER(email) = LOWER($2))",
    )
    .bind(username)
    .bind(email)
    .fetch_one(&mut *tx)
    .await?;
    if taken {
        return Err(AppError::Conflict);
    }

    let sql = format!(
        "INSERT INTO users (id, username, email, password_hash, verify_otp, verify_otp_expires) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(verify_otp)
        .bind(verify_otp_expires)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict,
            other => AppError::Database(other),
        })?;

    tx.commit().await?;
    Ok(user)
}

/// Fetch by id regardless of deletion state. Callers that must not see
/// deleted accounts use [`find_active_by_id`].
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_active_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_active_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
    let sql =
        format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_deleted = FALSE");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_active_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_deleted = FALSE ORDER BY created_at DESC"
    );
    let users = sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?;
    Ok(users)
}

pub async fn list_deleted(pool: &PgPool) -> Result<Vec<User>> {
    let sql =
        format!("SELECT {USER_COLUMNS} FROM users WHERE is_deleted = TRUE ORDER BY created_at DESC");
    let users = sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?;
    Ok(users)
}

pub async fn set_verify_otp(
    pool: &PgPool,
    id: Uuid,
    code: &str,
    expires: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET verify_otp = $2, verify_otp_expires = $3, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(code)
    .bind(expires)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Flip the verified flag and consume the pending code in one statement.
pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET is_verified = TRUE, verify_otp = NULL, verify_otp_expires = NULL, \
         updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn set_reset_otp(
    pool: &PgPool,
    id: Uuid,
    code: &str,
    expires: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET reset_otp = $2, reset_otp_expires = $3, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(code)
    .bind(expires)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Install the new password and consume the reset code in one statement, so
/// a code can never be redeemed twice.
pub async fn update_password_and_clear_reset(
    pool: &PgPool,
    id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, reset_otp = NULL, reset_otp_expires = NULL, \
         updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn store_refresh_token(
    pool: &PgPool,
    id: Uuid,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET refresh_token = $2, refresh_token_expires = $3, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(token)
    .bind(expires)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Drop the stored refresh token. Idempotent: clearing an already empty slot
/// is not an error.
pub async fn clear_refresh_token(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE users SET refresh_token = NULL, refresh_token_expires = NULL, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Swap in a newly issued refresh token and revoke the one it replaces, as a
/// single transaction. Either both take effect or neither does.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    new_token: &str,
    new_expires: DateTime<Utc>,
    old_token_hash: &str,
    old_expires: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO revoked_tokens (id, user_id, token_hash, token_type, reason, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (token_hash) DO UPDATE \
         SET reason = EXCLUDED.reason, expires_at = EXCLUDED.expires_at, revoked_at = NOW()",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(old_token_hash)
    .bind(TokenKind::Refresh)
    .bind(RevocationReason::Rotation)
    .bind(old_expires)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE users SET refresh_token = $2, refresh_token_expires = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(new_token)
    .bind(new_expires)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Soft delete. The row is flagged rather than removed so username and email
/// stay reserved and the account can be restored.
pub async fn mark_deleted(pool: &PgPool, id: Uuid, deleted_by: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET is_deleted = TRUE, deleted_by = $2, refresh_token = NULL, \
         refresh_token_expires = NULL, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(deleted_by)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn restore(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET is_deleted = FALSE, deleted_by = NULL, updated_at = NOW() \
         WHERE id = $1 AND is_deleted = TRUE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No deleted user with this id".to_string()));
    }
    Ok(())
}

pub async fn update_role(pool: &PgPool, id: Uuid, role: UserRole) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(role)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}
