use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::middleware::jwt_auth::CurrentUser;
use crate::models::user::{UserRole, UserSummary};

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// GET /api/v1/users/me
pub async fn get_me(current: CurrentUser, pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let user = db::users::find_by_id(&pool, current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User retrieved successfully",
        "data": user.summary(),
    })))
}

/// GET /api/v1/users/all
pub async fn get_all_users(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let all = db::users::list_active(&pool).await?;
    let (admins, users): (Vec<_>, Vec<_>) = all.into_iter().partition(|user| user.is_admin());
    let admins: Vec<UserSummary> = admins.iter().map(|user| user.summary()).collect();
    let users: Vec<UserSummary> = users.iter().map(|user| user.summary()).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Users retrieved successfully",
        "data": { "users": users, "admins": admins },
    })))
}

/// GET /api/v1/users/deleted
pub async fn get_deleted_users(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let users: Vec<UserSummary> = db::users::list_deleted(&pool)
        .await?
        .iter()
        .map(|user| user.summary())
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Deleted users retrieved successfully",
        "data": { "users": users },
    })))
}

/// GET /api/v1/users/{id}
pub async fn get_user(pool: web::Data<PgPool>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let user = db::users::find_active_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User retrieved successfully",
        "data": user.summary(),
    })))
}

/// PATCH /api/v1/users/{id}/role
pub async fn update_role(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse> {
    let role = UserRole::parse(&body.role).ok_or_else(|| {
        AppError::Validation("Role must be either 'admin' or 'user'".to_string())
    })?;

    let target = db::users::find_active_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.role == role {
        return Err(AppError::Validation(format!(
            "{} already has the role: {}",
            target.username,
            role.as_str().to_uppercase()
        )));
    }

    db::users::update_role(&pool, target.id, role).await?;
    tracing::info!(target_id = %target.id, role = role.as_str(), "user role updated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("{} role updated to {}", target.username, role.as_str().to_uppercase()),
    })))
}

/// DELETE /api/v1/users/{id}
///
/// Soft delete. An admin may delete regular users and their own account, but
/// never another admin.
pub async fn delete_user(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    current: CurrentUser,
) -> Result<HttpResponse> {
    let target = db::users::find_active_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.is_admin() && target.id != current.id {
        return Err(AppError::Forbidden(
            "Admins cannot delete other admins".to_string(),
        ));
    }

    db::users::mark_deleted(&pool, target.id, current.id).await?;
    tracing::info!(target_id = %target.id, deleted_by = %current.id, "user soft-deleted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("User {} has been deleted", target.username),
    })))
}

/// POST /api/v1/users/{id}/restore
pub async fn restore_user(pool: web::Data<PgPool>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let id = path.into_inner();
    db::users::restore(&pool, id).await?;
    tracing::info!(target_id = %id, "user restored");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User restored successfully",
    })))
}
