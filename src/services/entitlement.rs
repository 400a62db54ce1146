//! Who may fetch or review a material.
//!
//! [`access`] is the one predicate; downloads accept either path, reviews
//! accept only [`Access::Purchased`].

use chrono::Utc;
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::CommerceError;

/// How a user is entitled to a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Access {
    /// The user is the material's seller.
    Owner,
    /// The user bought it in a completed order.
    Purchased { order_item_id: i64 },
}

/// The minimum needed to decide access.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MaterialRef {
    pub id: i64,
    pub seller_id: i64,
}

/// Everything the download handler needs after the gate has passed.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadGrant {
    pub material_id: i64,
    #[serde(skip)]
    pub storage_name: String,
    /// Suggested client-side file name, `<title>.<file_type>`.
    pub filename: String,
    pub file_type: String,
    pub access: Access,
}

/// The order item proving `user_id` bought `material_id` in a completed order.
pub(crate) async fn purchased_item_id<'e, E>(
    executor: E,
    user_id: i64,
    material_id: i64,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        SELECT oi.id
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.buyer_id = ? AND oi.material_id = ? AND o.status = 'completed'
        ORDER BY oi.id
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(material_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn material_ref<'e, E>(
    executor: E,
    material_id: i64,
) -> Result<MaterialRef, CommerceError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, MaterialRef>("SELECT id, seller_id FROM materials WHERE id = ?")
        .bind(material_id)
        .fetch_optional(executor)
        .await?
        .ok_or(CommerceError::NotFound("Material"))
}

/// Resolves the access path of `user_id` to `material`, if any.
pub async fn access<'e, E>(
    executor: E,
    user_id: i64,
    material: MaterialRef,
) -> Result<Option<Access>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    if material.seller_id == user_id {
        return Ok(Some(Access::Owner));
    }
    Ok(purchased_item_id(executor, user_id, material.id)
        .await?
        .map(|order_item_id| Access::Purchased { order_item_id }))
}

/// True if the user owns the material or bought it.
pub async fn has_access(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
) -> Result<bool, CommerceError> {
    let material = material_ref(pool, material_id).await?;
    Ok(access(pool, user_id, material).await?.is_some())
}

/// True if the user bought the material in a completed order.
pub async fn has_purchased(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
) -> Result<bool, CommerceError> {
    Ok(purchased_item_id(pool, user_id, material_id)
        .await?
        .is_some())
}

/// Checks access and records the download.
///
/// Usage is written before any bytes are served, so a transfer the client
/// abandons still counts. Sellers fetching their own file are not counted.
pub async fn authorize_download(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
) -> Result<DownloadGrant, CommerceError> {
    let row: Option<(i64, i64, String, String, String)> = sqlx::query_as(
        "SELECT id, seller_id, title, file_type, file_path FROM materials WHERE id = ?",
    )
    .bind(material_id)
    .fetch_optional(pool)
    .await?;
    let (id, seller_id, title, file_type, file_path) =
        row.ok_or(CommerceError::NotFound("Material"))?;

    let granted = access(pool, user_id, MaterialRef { id, seller_id })
        .await?
        .ok_or_else(|| {
            CommerceError::AccessDenied("You do not have access to this file".to_string())
        })?;

    if let Access::Purchased { order_item_id } = granted {
        sqlx::query(
            r#"
            UPDATE order_items
            SET download_count = download_count + 1, last_download = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(order_item_id)
        .execute(pool)
        .await?;
    }

    tracing::info!(user_id, material_id, access = ?granted, "download authorized");

    Ok(DownloadGrant {
        material_id: id,
        storage_name: file_path,
        filename: download_filename(&title, &file_type),
        file_type,
        access: granted,
    })
}

/// `<title>.<file_type>` reduced to characters that are safe inside a
/// quoted Content-Disposition filename.
pub fn download_filename(title: &str, file_type: &str) -> String {
    let mut stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    stem = stem.trim_matches(|c: char| c == ' ' || c == '.').to_string();
    if stem.is_empty() {
        stem.push_str("download");
    }
    format!("{}.{}", stem, file_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_keeps_plain_titles() {
        assert_eq!(download_filename("Calculus Notes", "pdf"), "Calculus Notes.pdf");
    }

    #[test]
    fn filename_replaces_unsafe_characters() {
        assert_eq!(
            download_filename("a/b\"c\\d", "zip"),
            "a_b_c_d.zip"
        );
        assert_eq!(download_filename("Matematika – skúška", "pdf"), "Matematika _ sk__ka.pdf");
    }

    #[test]
    fn filename_never_empty() {
        assert_eq!(download_filename("...", "txt"), "download.txt");
    }
}
