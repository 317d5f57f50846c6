use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type. Every failure that crosses a handler boundary is
/// one of these variants, so the wire envelope stays uniform.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    MissingField(String),

    #[error("{0}")]
    Validation(String),

    #[error("User with this username or email already exists")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified. A new verification code has been sent to your email")]
    Unverified,

    #[error("Sorry, User {0} is blocked")]
    Blocked(String),

    #[error("User account has been deleted")]
    Deleted,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Refresh token is required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Invalid or expired refresh token")]
    Mismatch,

    #[error("An active code was already issued. Please wait for it to expire before requesting a new one")]
    OtpCooldown,

    #[error("The code you entered is either incorrect or has expired")]
    OtpInvalid,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable discriminant carried in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingField(_) => "MISSING_FIELD",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict => "CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unverified => "UNVERIFIED",
            AppError::Blocked(_) => "BLOCKED",
            AppError::Deleted => "DELETED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::MissingToken => "MISSING_TOKEN",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::ExpiredToken => "TOKEN_EXPIRED",
            AppError::Revoked => "TOKEN_REVOKED",
            AppError::Mismatch => "TOKEN_MISMATCH",
            AppError::OtpCooldown => "OTP_COOLDOWN",
            AppError::OtpInvalid => "OTP_INVALID",
            AppError::AlreadyVerified => "ALREADY_VERIFIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Email(_) => "EMAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_)
            | AppError::Validation(_)
            | AppError::OtpCooldown
            | AppError::OtpInvalid
            | AppError::AlreadyVerified => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::Unauthorized(_)
            | AppError::MissingToken
            | AppError::InvalidToken
            | AppError::ExpiredToken
            | AppError::Revoked
            | AppError::Mismatch => StatusCode::UNAUTHORIZED,
            AppError::Unverified
            | AppError::Blocked(_)
            | AppError::Deleted
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Email(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Infrastructure failures are logged with detail but reported to the
        // client with a generic message.
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                "An unexpected error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "An unexpected error occurred".to_string()
            }
            AppError::Email(e) => {
                tracing::error!(error = %e, "mail transport failure");
                "Failed to send email".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: self.kind().to_string(),
            message,
        })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid value for field '{}'", field),
                })
            })
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Validation(message)
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(e: lettre::error::Error) -> Self {
        AppError::Email(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        AppError::Email(e.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(e: lettre::address::AddressError) -> Self {
        AppError::Email(e.to_string())
    }
}

/// Rewrites actix's JSON extractor failures (missing fields, malformed bodies)
/// into the standard error envelope instead of the default plain-text 400.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &HttpRequest,
) -> actix_web::Error {
    let detail = err.to_string();
    let app_error = if detail.contains("missing field") {
        AppError::MissingField(detail)
    } else {
        AppError::Validation(detail)
    };
    let response = app_error.error_response();
    actix_web::error::InternalError::from_response(err, response).into()
}

/// Same treatment for path extractor failures, so a malformed `{id}` answers
/// with the envelope rather than actix's plain-text 404.
pub fn path_error_handler(
    err: actix_web::error::PathError,
    _req: &HttpRequest,
) -> actix_web::Error {
    let response = AppError::NotFound(err.to_string()).error_response();
    actix_web::error::InternalError::from_response(err, response).into()
}
