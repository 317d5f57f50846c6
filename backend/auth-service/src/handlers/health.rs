use actix_web::{web, HttpResponse, Responder};
use sqlx::PgPool;

/// GET /health
pub async fn health_check(pool: web::Data<PgPool>) -> impl Responder {
    let database = match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check database ping failed");
            "down"
        }
    };
    let status = if database == "up" { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "service": "auth-service",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
