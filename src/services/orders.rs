//! Read side of orders.

use sqlx::SqlitePool;

use crate::error::CommerceError;
use crate::models::order::{Order, OrderDetail, OrderItemView};

const ORDER_COLUMNS: &str = r#"
    id, order_number, total_amount_cents, status, payment_method, payment_id,
    created_at, completed_at, buyer_id
"#;

/// The buyer's orders, newest first.
pub async fn list_for_buyer(pool: &SqlitePool, buyer_id: i64) -> Result<Vec<Order>, CommerceError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// One order with its items. Visible to its buyer and to admins.
pub async fn detail(
    pool: &SqlitePool,
    viewer_id: i64,
    order_id: i64,
    viewer_is_admin: bool,
) -> Result<OrderDetail, CommerceError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CommerceError::NotFound("Order"))?;

    if order.buyer_id != viewer_id && !viewer_is_admin {
        return Err(CommerceError::AccessDenied(
            "You are not allowed to view this order".to_string(),
        ));
    }

    let items = items(pool, order.id).await?;
    Ok(OrderDetail { order, items })
}

pub async fn items(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderItemView>, CommerceError> {
    let items = sqlx::query_as::<_, OrderItemView>(
        r#"
        SELECT
            oi.id, oi.material_id, m.title, m.file_type, oi.price_cents,
            oi.download_count, oi.last_download
        FROM order_items oi
        JOIN materials m ON m.id = oi.material_id
        WHERE oi.order_id = ?
        ORDER BY oi.id
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}
