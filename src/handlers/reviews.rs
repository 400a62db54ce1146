// src/handlers/reviews.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError, models::review::ReviewRequest, services::reviews, utils::jwt::Claims,
};

pub async fn list_reviews(
    State(pool): State<SqlitePool>,
    Path(material_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(reviews::list_for_material(&pool, material_id).await?))
}

/// Reviews a purchased material. One review per buyer and material.
pub async fn create_review(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(material_id): Path<i64>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    let review = reviews::add_review(
        &pool,
        user_id,
        material_id,
        payload.rating,
        payload.comment.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(review_id): Path<i64>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    let review = reviews::update_review(
        &pool,
        user_id,
        review_id,
        payload.rating,
        payload.comment.as_deref(),
    )
    .await?;

    Ok(Json(review))
}

pub async fn mark_helpful(
    State(pool): State<SqlitePool>,
    Path(review_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let helpful_count = reviews::mark_helpful(&pool, review_id).await?;
    Ok(Json(json!({ "helpful_count": helpful_count })))
}
