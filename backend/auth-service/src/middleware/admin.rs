use std::rc::Rc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::error::AppError;
use crate::middleware::jwt_auth::CurrentUser;
use crate::models::user::UserRole;

/// Restricts a scope to admin principals. Must sit inside [`JwtAuth`], which
/// is what populates the principal this guard reads.
///
/// [`JwtAuth`]: crate::middleware::jwt_auth::JwtAuth
pub struct RequireAdmin;

impl<S, B> Transform<S, ServiceRequest> for RequireAdmin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequireAdminService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAdminService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAdminService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireAdminService<S>
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
            let role = req.extensions().get::<CurrentUser>().map(|user| user.role);
            match role {
                Some(UserRole::Admin) => service.call(req).await,
                Some(_) => Err(AppError::Forbidden(
                    "Access denied. Admin privileges required".to_string(),
                )
                .into()),
                None => {
                    Err(AppError::Unauthorized("Authentication required".to_string()).into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App, HttpResponse};
    use uuid::Uuid;

    fn principal(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            is_verified: true,
        }
    }

    async fn run_with_principal(principal: Option<CurrentUser>) -> StatusCode {
        let app = test::init_service(
            App::new()
                .wrap(RequireAdmin)
                .wrap_fn(move |req, srv| {
                    if let Some(user) = principal.clone() {
                        req.extensions_mut().insert(user);
                    }
                    srv.call(req)
                })
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        test::try_call_service(&app, req)
            .await
            .map(|res| res.status())
            .unwrap_or_else(|err| err.error_response().status())
    }

    #[actix_web::test]
    async fn test_admin_passes() {
        assert_eq!(
            run_with_principal(Some(principal(UserRole::Admin))).await,
            StatusCode::OK
        );
    }

    #[actix_web::test]
    async fn test_regular_user_is_forbidden() {
        assert_eq!(
            run_with_principal(Some(principal(UserRole::User))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[actix_web::test]
    async fn test_missing_principal_is_unauthorized() {
        assert_eq!(run_with_principal(None).await, StatusCode::UNAUTHORIZED);
    }
}
