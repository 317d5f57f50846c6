use std::rc::Rc;

use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::user::UserRole;
use crate::security::jwt::TokenCodec;

/// The authenticated principal, resolved from storage on every request and
/// inserted into request extensions. Never taken from the request body.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<CurrentUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(
                AppError::Unauthorized("Authentication required".to_string()).into(),
            )),
        }
    }
}

/// Bearer authentication gate. Verifies the access token, consults the
/// revocation ledger, loads the account and rejects deleted or blocked ones,
/// then makes the principal available as [`CurrentUser`].
pub struct JwtAuth;

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct JwtAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = extract_token(&req).ok_or_else(|| {
                AppError::Unauthorized("Missing authentication token".to_string())
            })?;

            let codec = req
                .app_data::<web::Data<TokenCodec>>()
                .cloned()
                .ok_or_else(|| AppError::Internal("token codec is not configured".to_string()))?;
            let pool = req
                .app_data::<web::Data<PgPool>>()
                .cloned()
                .ok_or_else(|| AppError::Internal("database pool is not configured".to_string()))?;

            let claims = codec.verify_access(&token)?;

            // A ledgered access token is dead even though its signature still
            // verifies. A ledger read failure rejects the request.
            let token_hash = db::token_revocation::hash_token(&token);
            if db::token_revocation::is_token_revoked(&pool, &token_hash).await? {
                return Err(AppError::Revoked.into());
            }

            let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
            let user = db::users::find_by_id(&pool, user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

            if user.is_deleted {
                return Err(AppError::Deleted.into());
            }
            if user.is_blocked {
                return Err(AppError::Blocked(user.username.clone()).into());
            }

            req.extensions_mut().insert(CurrentUser {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
                is_verified: user.is_verified,
            });

            service.call(req).await
        })
    }
}

/// Bearer header takes precedence; the access-token cookie is the fallback
/// for browser clients.
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(header_value) = req.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = header_value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    req.cookie("accessToken")
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn sample_principal() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: UserRole::User,
            is_verified: true,
        }
    }

    #[test]
    fn test_extract_token_from_bearer_header() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer header-token"))
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_extract_token_falls_back_to_cookie() {
        let req = TestRequest::default()
            .cookie(Cookie::new("accessToken", "cookie-token"))
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_extract_token_prefers_header_over_cookie() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer header-token"))
            .cookie(Cookie::new("accessToken", "cookie-token"))
            .to_srv_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_extract_token_rejects_malformed_header() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Token abc"))
            .to_srv_request();
        assert_eq!(extract_token(&req), None);

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer "))
            .to_srv_request();
        assert_eq!(extract_token(&req), None);
    }

    #[actix_web::test]
    async fn test_current_user_extraction() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(sample_principal());

        let user = CurrentUser::extract(&req).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin());
    }

    #[actix_web::test]
    async fn test_current_user_missing_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        let result = CurrentUser::extract(&req).await;
        assert!(result.is_err());
    }
}
