// src/models/review.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'reviews' table. One row per (material, reviewer).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: i64,
    /// 1 to 5 stars.
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub material_id: i64,
    pub reviewer_id: i64,
    /// Copied from the material so seller ratings need no join.
    pub seller_id: i64,
    pub helpful_count: i64,
}

/// DTO for displaying a review with its author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub reviewer_id: i64,
    pub reviewer_username: String,
    pub helpful_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating or editing a review.
///
/// The rating range is enforced by the review service so that entitlement
/// and duplicate checks run first.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub rating: i64,
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}
