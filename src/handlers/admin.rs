// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        catalog::{CreateCategoryRequest, CreateUniversityRequest},
        material::MaterialFlagsRequest,
        user::User,
    },
    services::catalog,
};

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List all users (Admin only), newest first.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}

pub async fn create_category(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = catalog::create_category(&pool, &payload).await?;
    tracing::info!(category_id = category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn create_university(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUniversityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let university = catalog::create_university(&pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(university)))
}

/// Sets the homepage placement flags of a material.
pub async fn set_material_flags(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<MaterialFlagsRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::set_flags(&pool, id, &payload).await?))
}
