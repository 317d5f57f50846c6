use actix_web::web;

use crate::handlers;
use crate::middleware::{JwtAuth, RequireAdmin};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health_check));
    cfg.service(
        web::scope("/api/v1")
            .configure(auth::configure)
            .configure(users::configure),
    );
}

pub mod auth {
    use super::*;

    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.service(
            web::scope("/auth")
                .route("/signup", web::post().to(handlers::auth::sign_up))
                .route("/signin", web::post().to(handlers::auth::sign_in))
                .route("/refresh-token", web::post().to(handlers::auth::refresh_token))
                .route("/send-reset-mail", web::post().to(handlers::auth::send_reset_mail))
                .route(
                    "/verify-reset-otp",
                    web::post().to(handlers::auth::verify_reset_otp),
                )
                // everything below requires a valid access token
                .service(
                    web::scope("")
                        .wrap(JwtAuth)
                        .route("/signout", web::post().to(handlers::auth::sign_out))
                        .route(
                            "/send-verification-mail",
                            web::post().to(handlers::auth::send_verification_mail),
                        )
                        .route("/verify-otp", web::post().to(handlers::auth::verify_otp))
                        .route(
                            "/is-authenticated",
                            web::get().to(handlers::auth::is_authenticated),
                        ),
                ),
        );
    }
}

pub mod users {
    use super::*;

    pub fn configure(cfg: &mut web::ServiceConfig) {
        // must be registered before /users so "me" is not captured by {id}
        cfg.service(
            web::scope("/users/me")
                .wrap(JwtAuth)
                .route("", web::get().to(handlers::users::get_me)),
        );
        cfg.service(
            web::scope("/users")
                .wrap(RequireAdmin)
                .wrap(JwtAuth)
                .route("/all", web::get().to(handlers::users::get_all_users))
                .route("/deleted", web::get().to(handlers::users::get_deleted_users))
                .route("/{id}", web::get().to(handlers::users::get_user))
                .route("/{id}/role", web::patch().to(handlers::users::update_role))
                .route("/{id}", web::delete().to(handlers::users::delete_user))
                .route(
                    "/{id}/restore",
                    web::post().to(handlers::users::restore_user),
                ),
        );
    }
}
