// src/handlers/commerce.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::catalog::{content_type, serve_file},
    models::{cart::CartAdd, order::CheckoutRequest},
    services::{
        cart,
        checkout::{self, CheckoutPolicy},
        entitlement, orders,
    },
    storage::FileStore,
    utils::jwt::Claims,
};

/// The current user's cart with its total.
pub async fn get_cart(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(cart::view(&pool, user_id).await?))
}

pub async fn cart_count(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let count = cart::count(&pool, user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// Adds a material to the cart.
///
/// Returns 201 when it was added and 200 when it was already there.
pub async fn add_to_cart(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(material_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let outcome = cart::add(&pool, user_id, material_id).await?;
    let count = cart::count(&pool, user_id).await?;

    let status = match outcome {
        CartAdd::Added => StatusCode::CREATED,
        CartAdd::AlreadyPresent => StatusCode::OK,
    };
    Ok((status, Json(json!({ "result": outcome, "count": count }))))
}

/// Removing something that is not in the cart is a no-op.
pub async fn remove_from_cart(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(material_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let removed = cart::remove(&pool, user_id, material_id).await?;
    let count = cart::count(&pool, user_id).await?;
    Ok(Json(json!({ "removed": removed, "count": count })))
}

/// Buys everything in the cart. The body is optional.
pub async fn checkout(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let payload: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    payload.validate()?;

    let policy = CheckoutPolicy::new(&config, payload.payment_method);
    let receipt = checkout::checkout(&pool, user_id, &policy).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_orders(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(orders::list_for_buyer(&pool, user_id).await?))
}

pub async fn get_order(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(orders::detail(&pool, user_id, id, claims.is_admin()).await?))
}

/// Streams a purchased (or own) material file as an attachment.
///
/// The download is recorded before the file is opened.
pub async fn download(
    State(pool): State<SqlitePool>,
    State(files): State<Arc<dyn FileStore>>,
    Extension(claims): Extension<Claims>,
    Path(material_id): Path<i64>,
    request: Request,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    let grant = entitlement::authorize_download(&pool, user_id, material_id).await?;

    let path = files.locate(&grant.storage_name).await.map_err(|e| {
        tracing::error!(
            "Stored file {} for material {} unreadable: {:?}",
            grant.storage_name,
            material_id,
            e
        );
        AppError::InternalServerError(e.to_string())
    })?;

    let disposition = format!("attachment; filename=\"{}\"", grant.filename);
    serve_file(path, request, content_type(&grant.file_type), Some(disposition)).await
}
