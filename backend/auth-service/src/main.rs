use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use auth_service::config::Config;
use auth_service::db;
use auth_service::error::{json_error_handler, path_error_handler};
use auth_service::routes::configure_routes;
use auth_service::security::jwt::TokenCodec;
use auth_service::services::email::EmailService;
use auth_service::services::sessions::SessionService;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Starting auth-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = db::create_pool(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to create database pool")?;

    let run_migrations = std::env::var("RUN_MIGRATIONS")
        .map(|v| v != "false")
        .unwrap_or(true);
    if run_migrations {
        db::run_migrations(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    let codec = TokenCodec::new(&config.jwt);
    let mailer =
        EmailService::new(&config.email).context("Failed to configure email transport")?;
    let sessions = SessionService::new(db_pool.clone(), codec.clone(), mailer, &config.session);

    // Periodically drop ledger entries whose tokens have expired on their own.
    {
        let pool = db_pool.clone();
        let interval_secs = config.session.revocation_prune_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match db::token_revocation::cleanup_expired(&pool).await {
                    Ok(pruned) if pruned > 0 => {
                        tracing::info!("revocation ledger pruned: {} expired entries", pruned);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "revocation ledger prune failed");
                    }
                }
            }
        });
    }

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at http://{}", bind_address);

    let server_config = config.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default();
        let mut any_origin = false;
        for origin in server_config.cors.allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
                any_origin = true;
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors
            .allow_any_method()
            .allow_any_header()
            .max_age(server_config.cors.max_age);
        if !any_origin {
            cors = cors.supports_credentials();
        }

        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(server_config.clone()))
            .app_data(web::Data::new(codec.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await?;

    Ok(())
}
