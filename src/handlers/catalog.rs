// src/handlers/catalog.rs

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    error::AppError,
    models::catalog::{BrowseParams, PageParams, SearchParams},
    services::catalog,
    storage::FileStore,
    utils::jwt::MaybeClaims,
};

/// Landing page: featured, best sellers, recent uploads and categories.
pub async fn home(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::home(&pool).await?))
}

/// Browse active materials.
///
/// Supports `category`, `min_price`, `max_price`, `file_type`, `q`, `sort`
/// and `page` query parameters.
pub async fn browse(
    State(pool): State<SqlitePool>,
    Query(params): Query<BrowseParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::browse(&pool, &params).await?))
}

/// Type-ahead search over titles, course codes and subjects.
pub async fn search(
    State(pool): State<SqlitePool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::quick_search(&pool, &params.q).await?))
}

pub async fn list_categories(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::categories(&pool).await?))
}

pub async fn category_materials(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::category_page(&pool, &slug, params.page).await?))
}

pub async fn list_universities(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::universities(&pool).await?))
}

/// Material detail. Works for anonymous visitors; a valid token adds the
/// viewer's purchase, cart and favorite status.
pub async fn material_detail(
    State(pool): State<SqlitePool>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = claims.map(|c| c.user_id()).transpose()?;
    Ok(Json(catalog::material_detail(&pool, id, viewer_id).await?))
}

/// Serves the preview image of an active material.
pub async fn preview(
    State(pool): State<SqlitePool>,
    State(files): State<Arc<dyn FileStore>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Response, AppError> {
    let (path, ext) = catalog::preview(&pool, files.as_ref(), id).await?;
    serve_file(path, request, content_type(&ext), None).await
}

/// Streams a stored file from disk instead of buffering it.
///
/// `ServeFile` handles conditional and range requests. The stored name
/// carries no meaning for clients, so its guessed content type is replaced
/// and an optional `Content-Disposition` is attached.
pub async fn serve_file(
    path: PathBuf,
    request: Request,
    content_type: &'static str,
    disposition: Option<String>,
) -> Result<Response, AppError> {
    let mut response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Some(disposition) = disposition {
            let value = HeaderValue::from_str(&disposition)
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}

pub async fn seller_profile(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog::seller_profile(&pool, id).await?))
}

/// MIME type for a stored file extension.
pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
