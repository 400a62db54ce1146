// src/models/material.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::catalog::Tag;
use super::review::ReviewView;

/// Represents the 'materials' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Material {
    pub id: i64,
    pub title: String,
    pub description: String,

    pub price_cents: i64,
    /// Pre-discount price, shown struck through when set.
    pub original_price_cents: Option<i64>,

    /// Storage name of the file. Only handed out through the download gate.
    #[serde(skip)]
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    #[serde(skip)]
    pub preview_image: Option<String>,

    pub category_id: Option<i64>,
    pub course_code: Option<String>,
    pub university: Option<String>,
    pub subject: Option<String>,

    pub views: i64,
    pub downloads: i64,
    /// Mean of the review ratings, 0 without reviews.
    pub rating: f64,
    pub rating_count: i64,

    /// Cleared instead of deleting the row.
    pub is_active: bool,
    pub is_featured: bool,
    pub is_best_seller: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub seller_id: i64,
}

impl Material {
    pub fn has_preview(&self) -> bool {
        self.preview_image.is_some()
    }
}

/// Listing card: the material plus its seller's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MaterialSummary {
    pub id: i64,
    pub title: String,
    pub price_cents: i64,
    pub original_price_cents: Option<i64>,
    pub file_type: String,
    pub category_id: Option<i64>,
    pub course_code: Option<String>,
    pub university: Option<String>,
    pub subject: Option<String>,
    pub downloads: i64,
    pub rating: f64,
    pub rating_count: i64,
    pub is_featured: bool,
    pub is_best_seller: bool,
    pub has_preview: bool,
    pub seller_id: i64,
    pub seller_username: String,
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`MaterialSummary`]; expects `materials m JOIN users u`.
pub const SUMMARY_COLUMNS: &str = r#"
    m.id, m.title, m.price_cents, m.original_price_cents, m.file_type,
    m.category_id, m.course_code, m.university, m.subject,
    m.downloads, m.rating, m.rating_count, m.is_featured, m.is_best_seller,
    (m.preview_image IS NOT NULL) AS has_preview,
    m.seller_id, u.username AS seller_username, m.created_at
"#;

/// Material detail page payload.
#[derive(Debug, Serialize)]
pub struct MaterialDetail {
    pub material: Material,
    pub has_preview: bool,
    pub seller_username: String,
    pub category: Option<String>,
    pub tags: Vec<Tag>,
    pub related: Vec<MaterialSummary>,
    pub reviews: Vec<ReviewView>,
    /// Only meaningful for a logged-in viewer.
    pub has_purchased: bool,
    pub in_cart: bool,
    pub is_favorite: bool,
}

/// Text fields of a listing, shared by create (multipart) and update (JSON).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MaterialForm {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 20000,
        message = "Description must be 1-20000 characters"
    ))]
    pub description: String,

    /// Decimal price string, e.g. "10.00".
    #[validate(length(min = 1, max = 16))]
    pub price: String,

    /// Optional pre-discount price.
    #[validate(length(max = 16))]
    pub original_price: Option<String>,

    pub category_id: Option<i64>,

    #[validate(length(max = 50))]
    pub course_code: Option<String>,
    #[validate(length(max = 150))]
    pub university: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,

    /// Tag names; blank entries are ignored.
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 tags"))]
    pub tags: Vec<String>,
}

/// An uploaded file before it reaches storage.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Lowercased extension after the last dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// Admin toggles for homepage placement.
#[derive(Debug, Deserialize)]
pub struct MaterialFlagsRequest {
    pub is_featured: Option<bool>,
    pub is_best_seller: Option<bool>,
}
