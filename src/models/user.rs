// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique login email.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub university: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,

    /// Set the first time the user lists a material.
    pub is_seller: bool,
    pub is_verified: bool,
    pub is_admin: bool,

    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,

    /// Lifetime seller earnings. Never decreases.
    pub total_earnings_cents: i64,

    /// Mean rating over every review received as a seller.
    pub seller_rating: f64,
}

/// Public view of a user, safe to show to anyone.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub university: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub is_seller: bool,
    pub is_verified: bool,
    pub seller_rating: f64,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Email address is not valid."))]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,

    pub confirm_password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 120))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for editing one's own profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
    #[validate(length(max = 150))]
    pub university: Option<String>,
    #[validate(length(max = 5000))]
    pub bio: Option<String>,
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub materials_count: i64,
    pub orders_count: i64,
    pub cart_count: i64,
}
