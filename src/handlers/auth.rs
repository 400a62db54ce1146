// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::user::{LoginRequest, RegisterRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.password != payload.confirm_password {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }

    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();

    let (username_taken, email_taken): (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM users WHERE username = ?),
            EXISTS(SELECT 1 FROM users WHERE email = ?)
        "#,
    )
    .bind(username)
    .bind(&email)
    .fetch_one(&pool)
    .await?;

    if username_taken {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }
    if email_taken {
        return Err(AppError::Conflict(format!("Email '{}' already exists", email)));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(&email)
    .bind(&hashed_password)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration.
        if is_unique_violation(&e) {
            AppError::Conflict("Username or email already exists".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user by email and returns a JWT token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(payload.email.trim().to_lowercase())
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    // Same message either way so emails cannot be probed.
    let user = user.ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&pool)
        .await?;

    let token = sign_jwt(
        user.id,
        user.is_admin,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user,
    })))
}
