//! Cart membership. A set per user: a material is in a cart at most once.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::CommerceError;
use crate::models::cart::{CartAdd, CartLine, CartView};

/// Puts `material_id` into the user's cart.
///
/// Inactive materials count as missing. Adding something already present
/// changes nothing and says so.
pub async fn add(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
) -> Result<CartAdd, CommerceError> {
    let seller_id =
        sqlx::query_scalar::<_, i64>("SELECT seller_id FROM materials WHERE id = ? AND is_active = 1")
            .bind(material_id)
            .fetch_optional(pool)
            .await?
            .ok_or(CommerceError::NotFound("Material"))?;

    if seller_id == user_id {
        return Err(CommerceError::SelfPurchase);
    }

    // OR IGNORE: two concurrent adds both succeed, one row results.
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO cart_items (user_id, material_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(material_id)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        Ok(CartAdd::AlreadyPresent)
    } else {
        tracing::debug!(user_id, material_id, "added to cart");
        Ok(CartAdd::Added)
    }
}

/// Takes `material_id` out of the cart. Returns whether it was there.
pub async fn remove(
    pool: &SqlitePool,
    user_id: i64,
    material_id: i64,
) -> Result<bool, CommerceError> {
    let removed = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND material_id = ?")
        .bind(user_id)
        .bind(material_id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(removed > 0)
}

/// Cart contents at current prices, oldest first.
pub async fn items(pool: &SqlitePool, user_id: i64) -> Result<Vec<CartLine>, CommerceError> {
    let lines = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT
            m.id AS material_id, m.title, m.price_cents, m.file_type,
            m.seller_id, u.username AS seller_username, c.added_at
        FROM cart_items c
        JOIN materials m ON m.id = c.material_id
        JOIN users u ON u.id = m.seller_id
        WHERE c.user_id = ?
        ORDER BY c.added_at, m.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(lines)
}

/// Sum of the current prices of everything in the cart. Never cached.
pub async fn total(pool: &SqlitePool, user_id: i64) -> Result<i64, CommerceError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(m.price_cents), 0)
        FROM cart_items c
        JOIN materials m ON m.id = c.material_id
        WHERE c.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

pub async fn count(pool: &SqlitePool, user_id: i64) -> Result<i64, CommerceError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Lines plus total, as shown on the cart page.
pub async fn view(pool: &SqlitePool, user_id: i64) -> Result<CartView, CommerceError> {
    let items = items(pool, user_id).await?;
    let total_cents = items.iter().map(|line| line.price_cents).sum();
    let count = items.len();

    Ok(CartView {
        items,
        total_cents,
        count,
    })
}
