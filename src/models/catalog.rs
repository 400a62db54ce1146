// src/models/catalog.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::material::MaterialSummary;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles"));

/// Represents the 'categories' table. `parent_id` links subcategories to
/// their parent; clients rebuild the tree from the flat list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Icon class name for the frontend.
    pub icon: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct University {
    pub id: i64,
    pub name: String,
    pub short_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// DTO for creating a category (admin).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100), custom(function = validate_slug))]
    pub slug: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    pub parent_id: Option<i64>,
}

/// DTO for creating a university (admin).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUniversityRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 20))]
    pub short_name: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
}

/// Lowercase words joined by single hyphens, e.g. `computer-science`.
pub fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if !SLUG_RE.is_match(slug) {
        return Err(validator::ValidationError::new("invalid_slug"));
    }
    Ok(())
}

/// Sort orders accepted by the browse endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
    Popular,
    Rating,
}

impl SortOrder {
    pub fn order_by(self) -> &'static str {
        match self {
            SortOrder::Newest => "m.created_at DESC, m.id DESC",
            SortOrder::Oldest => "m.created_at ASC, m.id ASC",
            SortOrder::PriceLow => "m.price_cents ASC, m.id ASC",
            SortOrder::PriceHigh => "m.price_cents DESC, m.id DESC",
            SortOrder::Popular => "m.downloads DESC, m.id DESC",
            SortOrder::Rating => "m.rating DESC, m.id DESC",
        }
    }
}

/// Query parameters for browsing the catalog.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseParams {
    /// Category slug.
    pub category: Option<String>,
    /// Decimal price bounds, e.g. "4.99".
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub file_type: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    /// Substring search over title, description, course code and subject.
    pub q: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// One page of results.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };
        Self {
            items,
            page,
            per_page,
            total,
            pages,
        }
    }
}

/// Compact search result for type-ahead.
#[derive(Debug, Serialize, FromRow)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub price_cents: i64,
    pub category: Option<String>,
}

/// Landing page payload.
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub categories: Vec<Category>,
    pub featured: Vec<MaterialSummary>,
    pub best_sellers: Vec<MaterialSummary>,
    pub recent: Vec<MaterialSummary>,
    pub total_materials: i64,
    pub total_sellers: i64,
}

/// Category header plus one page of its materials.
#[derive(Debug, Serialize)]
pub struct CategoryPage {
    pub category: Category,
    pub materials: Page<MaterialSummary>,
}
