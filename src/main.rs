// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use studyswap::config::Config;
use studyswap::db;
use studyswap::routes;
use studyswap::state::AppState;
use studyswap::storage::LocalFileStore;
use studyswap::utils::hash::hash_password;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env().unwrap_or_else(|e| panic!("Invalid configuration: {}", e));

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match db::connect(&config.database_url, 5).await {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }
    if let Err(e) = db::seed_categories(&pool).await {
        tracing::error!("Failed to seed categories: {:?}", e);
    }

    let files = LocalFileStore::open(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tracing::info!("Storing uploads in {}", files.root().display());

    let addr = config.bind_addr;
    let state = AppState {
        pool,
        config,
        files: Arc::new(files),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(username), Some(email), Some(password)) = (
        &config.admin_username,
        &config.admin_email,
        &config.admin_password,
    ) else {
        return Ok(());
    };

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ? OR email = ?)")
            .bind(username)
            .bind(email)
            .fetch_one(pool)
            .await?;

    if !exists {
        tracing::info!("Seeding admin user: {}", username);
        let hashed_password = hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, is_admin, is_verified, created_at)
            VALUES (?, ?, ?, 1, 1, ?)
            "#,
        )
        .bind(username)
        .bind(email.to_lowercase())
        .bind(hashed_password)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        tracing::info!("Admin user created successfully.");
    }
    Ok(())
}
