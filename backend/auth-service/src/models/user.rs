use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full account row. Deliberately not serializable: the password hash and the
/// pending codes never leave the storage boundary. API responses go through
/// [`UserSummary`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    pub verify_otp: Option<String>,
    pub verify_otp_expires: Option<DateTime<Utc>>,
    pub reset_otp: Option<String>,
    pub reset_otp_expires: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// True while a previously issued verification code is still inside its
    /// validity window, which blocks issuing a fresh one.
    pub fn has_live_verify_otp(&self, now: DateTime<Utc>) -> bool {
        self.verify_otp.is_some()
            && self.verify_otp_expires.map_or(false, |expires| expires > now)
    }

    pub fn has_live_reset_otp(&self, now: DateTime<Utc>) -> bool {
        self.reset_otp.is_some()
            && self.reset_otp_expires.map_or(false, |expires| expires > now)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            is_verified: self.is_verified,
            is_blocked: self.is_blocked,
            is_deleted: self.is_deleted,
            deleted_by: self.deleted_by,
            created_at: self.created_at,
        }
    }
}

/// Public projection of an account, safe to return from any endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: UserRole::User,
            is_verified: false,
            is_blocked: false,
            is_deleted: false,
            deleted_by: None,
            verify_otp: None,
            verify_otp_expires: None,
            reset_otp: None,
            reset_otp_expires: None,
            refresh_token: None,
            refresh_token_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::parse("superuser"), None);
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_has_live_verify_otp() {
        let now = Utc::now();
        let mut user = sample_user();
        assert!(!user.has_live_verify_otp(now));

        user.verify_otp = Some("123456".to_string());
        user.verify_otp_expires = Some(now + Duration::minutes(10));
        assert!(user.has_live_verify_otp(now));

        user.verify_otp_expires = Some(now - Duration::seconds(1));
        assert!(!user.has_live_verify_otp(now));
    }

    #[test]
    fn test_summary_uses_camel_case_and_omits_secrets() {
        let user = sample_user();
        let json = serde_json::to_value(user.summary()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["isVerified"], false);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("deletedBy").is_none());
    }
}
