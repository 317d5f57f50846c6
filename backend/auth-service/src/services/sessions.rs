use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::db;
use crate::error::{AppError, Result};
use crate::models::token_revocation::{RevocationReason, TokenKind};
use crate::models::user::{User, UserSummary};
use crate::security::jwt::TokenCodec;
use crate::security::{otp, password};
use crate::services::email::EmailService;
use crate::validators::{self, IdentifierKind, PASSWORD_MIN_LENGTH};

/// Tokens minted for a fresh session.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub access_expires_in: i64,
    /// Seconds until the refresh token expires.
    pub refresh_expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user: UserSummary,
    pub tokens: SessionTokens,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub access_expires_in: i64,
    /// Present only when rotation is enabled: the replacement refresh token.
    pub refresh_token: Option<String>,
    pub refresh_expires_in: i64,
}

/// Owns the account and session lifecycle end to end. Handlers stay thin:
/// they translate HTTP to these calls and map outcomes onto cookies and
/// response bodies.
#[derive(Clone)]
pub struct SessionService {
    db: PgPool,
    tokens: TokenCodec,
    mailer: EmailService,
    rotate_refresh_tokens: bool,
}

impl SessionService {
    pub fn new(
        db: PgPool,
        tokens: TokenCodec,
        mailer: EmailService,
        settings: &SessionConfig,
    ) -> Self {
        SessionService {
            db,
            tokens,
            mailer,
            rotate_refresh_tokens: settings.rotate_refresh_tokens,
        }
    }

    /// Register an account. The row is created unverified with its first
    /// verification code already attached, then the code is mailed out.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserSummary> {
        if !validators::validate_username(username) {
            return Err(AppError::Validation(
                "Username must be 3-30 characters of letters, numbers, hyphens or underscores"
                    .to_string(),
            ));
        }
        if !validators::validate_email(email) {
            return Err(AppError::Validation(
                "Email must be a valid email address".to_string(),
            ));
        }
        if !validators::validate_password(password) {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LENGTH
            )));
        }

        let email = email.to_lowercase();
        let password_hash = password::hash_password(password)?;
        let code = otp::generate_otp();

        let user = db::users::create_user(
            &self.db,
            username,
            &email,
            &password_hash,
            &code,
            otp::otp_expiry(),
        )
        .await?;

        self.mailer
            .send_verification_email(&user.email, &user.username, &code)
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(user.summary())
    }

    /// Authenticate and open a session. Absent user and wrong password are
    /// indistinguishable to the caller. An unverified account gets a fresh
    /// verification code on every attempt, bypassing the resend cooldown.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutcome> {
        let user = match db::users::find_active_by_username(&self.db, username).await? {
            Some(user) => user,
            None => {
                tracing::warn!(username, "sign-in failed: unknown user");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !password::verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "sign-in failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if user.is_blocked {
            tracing::warn!(user_id = %user.id, "sign-in refused: account is blocked");
            return Err(AppError::Blocked(user.username.clone()));
        }

        if !user.is_verified {
            self.issue_verification_code(&user).await?;
            return Err(AppError::Unverified);
        }

        let tokens = self.issue_session(&user).await?;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok(SignInOutcome {
            user: user.summary(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new access token. The presented token
    /// must verify under the refresh key, must not be in the revocation
    /// ledger, and must equal the single stored session copy.
    pub async fn refresh(&self, raw_token: &str) -> Result<RefreshOutcome> {
        let token_hash = db::token_revocation::hash_token(raw_token);
        if db::token_revocation::is_token_revoked(&self.db, &token_hash).await? {
            tracing::warn!("refresh refused: token is in the revocation ledger");
            return Err(AppError::Revoked);
        }

        let claims = self.tokens.verify_refresh(raw_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        let user = db::users::find_active_by_id(&self.db, user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let now = Utc::now();
        let stored_matches = user.refresh_token.as_deref() == Some(raw_token)
            && user
                .refresh_token_expires
                .map_or(false, |expires| expires > now);
        if !stored_matches {
            tracing::warn!(user_id = %user.id, "refresh refused: token does not match the stored session");
            return Err(AppError::Mismatch);
        }

        let access_token = self
            .tokens
            .issue_access(user.id, &user.username, &user.email)?;

        let rotated = if self.rotate_refresh_tokens {
            let new_refresh = self.tokens.issue_refresh(user.id)?;
            let new_expires = now + Duration::seconds(self.tokens.refresh_ttl());
            let old_expires = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
            db::users::rotate_refresh_token(
                &self.db,
                user.id,
                &new_refresh,
                new_expires,
                &token_hash,
                old_expires,
            )
            .await?;
            Some(new_refresh)
        } else {
            None
        };

        tracing::debug!(user_id = %user.id, rotated = rotated.is_some(), "access token refreshed");
        Ok(RefreshOutcome {
            access_token,
            access_expires_in: self.tokens.access_ttl(),
            refresh_token: rotated,
            refresh_expires_in: self.tokens.refresh_ttl(),
        })
    }

    /// Close the session. The refresh token, when present and verifiable, is
    /// written to the revocation ledger before the stored copy is cleared.
    /// An unusable token is skipped rather than reported: sign-out succeeds
    /// for the caller either way.
    pub async fn sign_out(&self, user_id: Uuid, refresh_token: Option<&str>) -> Result<()> {
        if let Some(raw) = refresh_token {
            match self.tokens.verify_refresh(raw) {
                Ok(claims) => {
                    let expires_at =
                        DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
                    db::token_revocation::revoke_token(
                        &self.db,
                        user_id,
                        &db::token_revocation::hash_token(raw),
                        TokenKind::Refresh,
                        RevocationReason::Logout,
                        expires_at,
                    )
                    .await?;
                }
                Err(e) => {
                    tracing::debug!(user_id = %user_id, error = %e, "sign-out token not ledgered: failed verification");
                }
            }
        }

        db::users::clear_refresh_token(&self.db, user_id).await?;
        tracing::info!(user_id = %user_id, "user signed out");
        Ok(())
    }

    /// Issue a verification code on request. Unlike the sign-in path this
    /// honors the cooldown: while an unexpired code exists, no new one is
    /// issued.
    pub async fn send_verification(&self, user_id: Uuid) -> Result<()> {
        let user = db::users::find_active_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.is_blocked {
            return Err(AppError::Blocked(user.username.clone()));
        }
        if user.is_verified {
            return Err(AppError::AlreadyVerified);
        }
        if user.has_live_verify_otp(Utc::now()) {
            return Err(AppError::OtpCooldown);
        }

        self.issue_verification_code(&user).await
    }

    /// Redeem a verification code. Wrong code and expired code produce the
    /// same error.
    pub async fn verify_otp(&self, user_id: Uuid, code: &str) -> Result<()> {
        let user = db::users::find_active_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.is_verified {
            return Err(AppError::AlreadyVerified);
        }

        let now = Utc::now();
        let accepted = otp::is_valid_format(code)
            && matches!(user.verify_otp.as_deref(), Some(stored) if stored == code)
            && user.verify_otp_expires.map_or(false, |expires| expires > now);
        if !accepted {
            tracing::warn!(user_id = %user.id, "email verification failed: bad or expired code");
            return Err(AppError::OtpInvalid);
        }

        db::users::mark_verified(&self.db, user.id).await?;
        tracing::info!(user_id = %user.id, "email verified");
        Ok(())
    }

    /// Start a password reset. The identifier is an email address or a
    /// username, told apart by shape. Returns the username so the caller can
    /// hand it back for the redeem step.
    pub async fn send_password_reset(&self, identifier: &str) -> Result<String> {
        let user = match validators::classify_identifier(identifier) {
            IdentifierKind::Email => db::users::find_active_by_email(&self.db, identifier).await?,
            IdentifierKind::Username => {
                db::users::find_active_by_username(&self.db, identifier).await?
            }
        }
        .ok_or_else(|| {
            AppError::NotFound("No user found with this email or username".to_string())
        })?;

        if user.is_blocked {
            return Err(AppError::Blocked(user.username.clone()));
        }
        if user.has_live_reset_otp(Utc::now()) {
            return Err(AppError::OtpCooldown);
        }

        let code = otp::generate_otp();
        db::users::set_reset_otp(&self.db, user.id, &code, otp::otp_expiry()).await?;
        self.mailer
            .send_password_reset_email(&user.email, &user.username, &code)
            .await?;

        tracing::info!(user_id = %user.id, "password reset code issued");
        Ok(user.username)
    }

    /// Redeem a reset code and install the new password. The code is
    /// consumed in the same statement that updates the password.
    pub async fn verify_password_reset(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        if !validators::validate_password(new_password) {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LENGTH
            )));
        }

        let user = db::users::find_active_by_username(&self.db, username)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No user found with this email or username".to_string())
            })?;

        // Blocked is gated at the send step; here the code itself is the
        // authentication factor.
        let now = Utc::now();
        let accepted = otp::is_valid_format(code)
            && matches!(user.reset_otp.as_deref(), Some(stored) if stored == code)
            && user.reset_otp_expires.map_or(false, |expires| expires > now);
        if !accepted {
            tracing::warn!(user_id = %user.id, "password reset failed: bad or expired code");
            return Err(AppError::OtpInvalid);
        }

        let password_hash = password::hash_password(new_password)?;
        db::users::update_password_and_clear_reset(&self.db, user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    async fn issue_verification_code(&self, user: &User) -> Result<()> {
        let code = otp::generate_otp();
        db::users::set_verify_otp(&self.db, user.id, &code, otp::otp_expiry()).await?;
        self.mailer
            .send_verification_email(&user.email, &user.username, &code)
            .await?;
        tracing::info!(user_id = %user.id, "verification code issued");
        Ok(())
    }

    async fn issue_session(&self, user: &User) -> Result<SessionTokens> {
        let access_token = self
            .tokens
            .issue_access(user.id, &user.username, &user.email)?;
        let refresh_token = self.tokens.issue_refresh(user.id)?;
        let refresh_expires = Utc::now() + Duration::seconds(self.tokens.refresh_ttl());
        db::users::store_refresh_token(&self.db, user.id, &refresh_token, refresh_expires).await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_expires_in: self.tokens.access_ttl(),
            refresh_expires_in: self.tokens.refresh_ttl(),
        })
    }
}
