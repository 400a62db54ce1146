// src/models/cart.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A material sitting in a cart, priced at its current price.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CartLine {
    pub material_id: i64,
    pub title: String,
    pub price_cents: i64,
    pub file_type: String,
    pub seller_id: i64,
    pub seller_username: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_cents: i64,
    pub count: usize,
}

/// Outcome of adding to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAdd {
    Added,
    AlreadyPresent,
}
