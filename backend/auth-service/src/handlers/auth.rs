use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::jwt_auth::CurrentUser;
use crate::services::sessions::SessionService;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
    pub username: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct SendResetRequest {
    /// Email address or username; told apart by shape.
    pub identifier: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResetRequest {
    pub username: String,
    pub otp: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// POST /api/v1/auth/signup
pub async fn sign_up(
    body: web::Json<SignUpRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    body.validate()?;
    let user = sessions
        .sign_up(&body.username, &body.email, &body.password)
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully. Please verify your email address.",
        "data": user,
    })))
}

/// POST /api/v1/auth/signin
pub async fn sign_in(
    body: web::Json<SignInRequest>,
    sessions: web::Data<SessionService>,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let outcome = sessions.sign_in(&body.username, &body.password).await?;
    let production = config.is_production();

    Ok(HttpResponse::Ok()
        .cookie(access_cookie(
            outcome.tokens.access_token.clone(),
            outcome.tokens.access_expires_in,
            production,
        ))
        .cookie(refresh_cookie(
            outcome.tokens.refresh_token.clone(),
            outcome.tokens.refresh_expires_in,
            production,
        ))
        .json(json!({
            "success": true,
            "message": "Signed in successfully",
            "accessToken": outcome.tokens.access_token,
            "refreshToken": outcome.tokens.refresh_token,
            "data": outcome.user,
        })))
}

/// POST /api/v1/auth/refresh-token
///
/// The refresh token is read from the http-only cookie first, then from the
/// body for clients that do not use cookies.
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionService>,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let token = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.as_ref().and_then(|b| b.refresh_token.clone()))
        .ok_or(AppError::MissingToken)?;

    let outcome = sessions.refresh(&token).await?;
    let production = config.is_production();

    let mut response = HttpResponse::Ok();
    response.cookie(access_cookie(
        outcome.access_token.clone(),
        outcome.access_expires_in,
        production,
    ));
    if let Some(new_refresh) = &outcome.refresh_token {
        response.cookie(refresh_cookie(
            new_refresh.clone(),
            outcome.refresh_expires_in,
            production,
        ));
    }

    let mut payload = json!({
        "success": true,
        "message": "Access token refreshed",
        "accessToken": outcome.access_token,
    });
    if let Some(new_refresh) = &outcome.refresh_token {
        payload["refreshToken"] = json!(new_refresh);
    }

    Ok(response.json(payload))
}

/// POST /api/v1/auth/signout
pub async fn sign_out(
    req: HttpRequest,
    current: CurrentUser,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    let refresh = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string());
    sessions.sign_out(current.id, refresh.as_deref()).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(json!({
            "success": true,
            "message": "Signed out successfully",
        })))
}

/// POST /api/v1/auth/send-verification-mail
pub async fn send_verification_mail(
    current: CurrentUser,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    sessions.send_verification(current.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Verification code sent to your email address",
    })))
}

/// POST /api/v1/auth/verify-otp
pub async fn verify_otp(
    current: CurrentUser,
    body: web::Json<VerifyOtpRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    sessions.verify_otp(current.id, &body.otp).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Email verified successfully",
    })))
}

/// POST /api/v1/auth/send-reset-mail
pub async fn send_reset_mail(
    body: web::Json<SendResetRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    let username = sessions.send_password_reset(&body.identifier).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password reset code sent to your email address",
        "data": { "username": username },
    })))
}

/// POST /api/v1/auth/verify-reset-otp
pub async fn verify_reset_otp(
    body: web::Json<VerifyResetRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse> {
    body.validate()?;
    sessions
        .verify_password_reset(&body.username, &body.otp, &body.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password has been reset successfully. Please sign in with your new password.",
    })))
}

/// GET /api/v1/auth/is-authenticated
pub async fn is_authenticated(current: CurrentUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Authenticated",
        "user": {
            "id": current.id,
            "username": current.username,
            "email": current.email,
            "role": current.role,
            "isVerified": current.is_verified,
        },
    })))
}

/// Readable by frontend code, so deliberately not http-only.
fn access_cookie(value: String, max_age_secs: i64, production: bool) -> Cookie<'static> {
    Cookie::build(ACCESS_COOKIE, value)
        .path("/")
        .http_only(false)
        .secure(production)
        .same_site(cookie_site(production))
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn refresh_cookie(value: String, max_age_secs: i64, production: bool) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(cookie_site(production))
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Cross-site frontends need SameSite=None, which browsers only accept over
/// https. Development stays on Lax so plain http keeps working.
fn cookie_site(production: bool) -> SameSite {
    if production {
        SameSite::None
    } else {
        SameSite::Lax
    }
}
