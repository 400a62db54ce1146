// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{MeResponse, UpdateProfileRequest, User},
    services::{catalog, favorites},
    utils::{html::clean_optional, jwt::Claims},
};

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Indexed on the user id columns, so plain subqueries are fine.
    let (materials_count, orders_count, cart_count): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM materials WHERE seller_id = ? AND is_active = 1),
            (SELECT COUNT(*) FROM orders WHERE buyer_id = ?),
            (SELECT COUNT(*) FROM cart_items WHERE user_id = ?)
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        user,
        materials_count,
        orders_count,
        cart_count,
    }))
}

/// Updates the caller's profile. Omitted fields are cleared.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    let trimmed = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = ?, last_name = ?, university = ?, bio = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(trimmed(&payload.first_name))
    .bind(trimmed(&payload.last_name))
    .bind(trimmed(&payload.university))
    .bind(clean_optional(payload.bio.as_deref()))
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// The caller's listings, including deactivated ones.
pub async fn list_my_materials(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(catalog::materials_by_seller(&pool, user_id, true).await?))
}

/// List materials favorited by the current user.
pub async fn list_my_favorites(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(favorites::list(&pool, user_id).await?))
}

pub async fn toggle_favorite(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(material_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let is_favorite = favorites::toggle(&pool, user_id, material_id).await?;
    Ok(Json(json!({ "is_favorite": is_favorite })))
}
