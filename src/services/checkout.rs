//! Turning a cart into an order.
//!
//! Everything a checkout writes (order, items, download counters, seller
//! earnings, the emptied cart) happens inside one transaction. Returning
//! early with an error drops the transaction, which rolls all of it back.

use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::CommerceError;
use crate::models::order::{OrderReceipt, OrderStatus};
use crate::utils::money::{format_cents, seller_share_cents, sum_cents};

const ORDER_NUMBER_PREFIX: &str = "SS-";
const ORDER_NUMBER_ATTEMPTS: usize = 5;
const DEFAULT_PAYMENT_METHOD: &str = "card";

/// Settings that shape a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutPolicy {
    /// Percent of each item price credited to its seller.
    pub seller_share_percent: u8,
    pub payment_method: String,
}

impl CheckoutPolicy {
    pub fn new(config: &Config, payment_method: Option<String>) -> Self {
        Self {
            seller_share_percent: config.seller_share_percent,
            payment_method: payment_method.unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
        }
    }
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            seller_share_percent: crate::config::DEFAULT_SELLER_SHARE_PERCENT,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        }
    }
}

/// A claimed cart entry priced at checkout time.
#[derive(Debug, FromRow)]
struct CheckoutLine {
    id: i64,
    seller_id: i64,
    price_cents: i64,
}

/// Random, non-sequential order number such as `SS-9F1C04AB7E`.
pub fn new_order_number() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}{}", ORDER_NUMBER_PREFIX, token[..10].to_ascii_uppercase())
}

async fn allocate_order_number(conn: &mut SqliteConnection) -> Result<String, CommerceError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = new_order_number();
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_number = ?")
                .bind(&candidate)
                .fetch_one(&mut *conn)
                .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        tracing::warn!("Order number {} already taken, drawing another", candidate);
    }

    Err(CommerceError::Storage(sqlx::Error::Protocol(
        "could not allocate a unique order number".to_string(),
    )))
}

/// Buys everything in the user's cart.
pub async fn checkout(
    pool: &SqlitePool,
    buyer_id: i64,
    policy: &CheckoutPolicy,
) -> Result<OrderReceipt, CommerceError> {
    let mut tx = pool.begin().await?;

    // Claiming the cart is the first statement so it takes the write lock:
    // a concurrent checkout of the same cart waits, then finds it empty.
    let claimed: Vec<i64> =
        sqlx::query_scalar("DELETE FROM cart_items WHERE user_id = ? RETURNING material_id")
            .bind(buyer_id)
            .fetch_all(&mut *tx)
            .await?;

    if claimed.is_empty() {
        return Err(CommerceError::EmptyCart);
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, seller_id, price_cents FROM materials WHERE id IN (",
    );
    let mut separated = query_builder.separated(", ");
    for id in &claimed {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let lines: Vec<CheckoutLine> = query_builder
        .build_query_as()
        .fetch_all(&mut *tx)
        .await?;

    let total_amount_cents = sum_cents(lines.iter().map(|line| line.price_cents))?;
    let order_number = allocate_order_number(&mut tx).await?;
    let now = Utc::now();
    let payment_id = format!("stub_{}", Uuid::new_v4().simple());

    let order_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO orders (
            order_number, total_amount_cents, status, payment_method, payment_id,
            created_at, completed_at, buyer_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&order_number)
    .bind(total_amount_cents)
    .bind(OrderStatus::Completed)
    .bind(&policy.payment_method)
    .bind(&payment_id)
    .bind(now)
    .bind(now)
    .bind(buyer_id)
    .fetch_one(&mut *tx)
    .await?;

    for line in &lines {
        let share = seller_share_cents(line.price_cents, policy.seller_share_percent)?;

        sqlx::query("INSERT INTO order_items (order_id, material_id, price_cents) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(line.id)
            .bind(line.price_cents)
            .execute(&mut *tx)
            .await?;

        // Counted at purchase time, not on file retrieval.
        sqlx::query("UPDATE materials SET downloads = downloads + 1 WHERE id = ?")
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE users SET total_earnings_cents = total_earnings_cents + ? WHERE id = ?",
        )
        .bind(share)
        .bind(line.seller_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        buyer_id,
        order_id,
        order_number = %order_number,
        total = %format_cents(total_amount_cents),
        items = lines.len(),
        "checkout completed"
    );

    Ok(OrderReceipt {
        order_id,
        order_number,
        total_amount_cents,
        item_count: lines.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_have_expected_shape() {
        let number = new_order_number();
        assert!(number.starts_with("SS-"));
        assert_eq!(number.len(), 13);
        assert!(
            number[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn order_numbers_are_not_sequential() {
        let a = new_order_number();
        let b = new_order_number();
        assert_ne!(a, b);
    }

    #[test]
    fn default_policy_uses_eighty_percent() {
        let policy = CheckoutPolicy::default();
        assert_eq!(policy.seller_share_percent, 80);
        assert_eq!(policy.payment_method, "card");
    }
}
