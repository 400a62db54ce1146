//! Wishlist of materials.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::CommerceError;
use crate::models::material::{MaterialSummary, SUMMARY_COLUMNS};

/// Adds the material to the user's favorites, or removes it if present.
/// Returns whether it is a favorite afterwards.
pub async fn toggle(pool: &SqlitePool, user_id: i64, material_id: i64) -> Result<bool, CommerceError> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND material_id = ?")
        .bind(user_id)
        .bind(material_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed > 0 {
        tx.commit().await?;
        return Ok(false);
    }

    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM materials WHERE id = ?")
        .bind(material_id)
        .fetch_optional(&mut *tx)
        .await?;
    if active != Some(true) {
        return Err(CommerceError::NotFound("Material"));
    }

    sqlx::query("INSERT INTO favorites (user_id, material_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(material_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(true)
}

/// The user's active favorites, most recently added first.
pub async fn list(pool: &SqlitePool, user_id: i64) -> Result<Vec<MaterialSummary>, CommerceError> {
    let favorites = sqlx::query_as::<_, MaterialSummary>(&format!(
        r#"
        SELECT {SUMMARY_COLUMNS}
        FROM favorites f
        JOIN materials m ON m.id = f.material_id
        JOIN users u ON u.id = m.seller_id
        WHERE f.user_id = ? AND m.is_active = 1
        ORDER BY f.created_at DESC, m.id DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(favorites)
}
