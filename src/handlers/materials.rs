// src/handlers/materials.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::material::{MaterialForm, Upload},
    services::catalog,
    storage::FileStore,
    utils::jwt::Claims,
};

/// A parsed sell form: text fields plus the material file and optional preview.
#[derive(Debug, Default)]
struct SellForm {
    form: MaterialForm,
    file: Option<Upload>,
    preview: Option<Upload>,
}

fn optional(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

async fn read_sell_form(mut multipart: Multipart) -> Result<SellForm, AppError> {
    let mut sell = SellForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "preview" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?.to_vec();
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let upload = Upload { file_name, bytes };
                if name == "file" {
                    sell.file = Some(upload);
                } else {
                    sell.preview = Some(upload);
                }
            }
            _ => {
                let value = field.text().await?;
                let form = &mut sell.form;
                match name.as_str() {
                    "title" => form.title = value,
                    "description" => form.description = value,
                    "price" => form.price = value,
                    "original_price" => form.original_price = optional(value),
                    "category_id" => {
                        form.category_id = match optional(value) {
                            Some(v) => Some(v.parse().map_err(|_| {
                                AppError::BadRequest("category_id must be a number".to_string())
                            })?),
                            None => None,
                        }
                    }
                    "course_code" => form.course_code = optional(value),
                    "university" => form.university = optional(value),
                    "subject" => form.subject = optional(value),
                    // Either repeated fields or one comma-separated value.
                    "tags" => form.tags.extend(
                        value
                            .split(',')
                            .map(|t| t.trim().to_string())
                            .filter(|t| !t.is_empty()),
                    ),
                    other => tracing::debug!("Ignoring unknown form field '{}'", other),
                }
            }
        }
    }

    Ok(sell)
}

/// Lists a new material for sale (multipart form).
///
/// Returns 201 Created with the material.
pub async fn create_material(
    State(pool): State<SqlitePool>,
    State(files): State<Arc<dyn FileStore>>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let seller_id = claims.user_id()?;
    let sell = read_sell_form(multipart).await?;
    let file = sell
        .file
        .ok_or(AppError::BadRequest("A file is required".to_string()))?;

    let material = catalog::create_material(
        &pool,
        files.as_ref(),
        seller_id,
        &sell.form,
        &file,
        sell.preview.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(material)))
}

/// Edits a material's listing. Seller or admin only.
pub async fn update_material(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<MaterialForm>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let material =
        catalog::update_material(&pool, user_id, claims.is_admin(), id, &payload).await?;
    Ok(Json(material))
}

/// Takes a material off the market. Existing buyers keep access.
pub async fn delete_material(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    catalog::deactivate_material(&pool, user_id, claims.is_admin(), id).await?;
    Ok(Json(json!({ "message": "Material deactivated" })))
}
