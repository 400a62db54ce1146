// src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Lifecycle of an order. Checkout creates orders directly as `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Refunded,
}

/// Represents the 'orders' table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub total_amount_cents: i64,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub buyer_id: i64,
}

/// One line of an order, joined with the material's title.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItemView {
    pub id: i64,
    pub material_id: i64,
    pub title: String,
    pub file_type: String,
    /// Price paid, frozen at checkout.
    pub price_cents: i64,
    pub download_count: i64,
    pub last_download: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemView>,
}

/// What checkout hands back for the confirmation view.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_id: i64,
    pub order_number: String,
    pub total_amount_cents: i64,
    pub item_count: usize,
}

/// DTO for checkout. Payment is a stub; only the method name is recorded.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
}
