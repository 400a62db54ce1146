// src/db.rs

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Default categories created on first start.
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Programming", "programming", "bi-code-slash"),
    ("Mathematics", "mathematics", "bi-calculator"),
    ("Science", "science", "bi-journal-bookmark"),
    ("Networking", "networking", "bi-diagram-3"),
    ("Business", "business", "bi-briefcase"),
    ("Writing", "writing", "bi-pencil"),
];

/// Opens a pool on `database_url`.
///
/// Writers wait on the busy timeout instead of failing with SQLITE_BUSY.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
}

/// A private in-memory database with the schema applied. Used by tests.
///
/// A single connection that never expires, since every new in-memory
/// connection would be a fresh empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// Inserts the default categories when the table is empty.
pub async fn seed_categories(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for &(name, slug, icon) in DEFAULT_CATEGORIES {
        sqlx::query("INSERT INTO categories (name, slug, icon) VALUES (?, ?, ?)")
            .bind(name)
            .bind(slug)
            .bind(icon)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!("Seeded {} default categories.", DEFAULT_CATEGORIES.len());
    Ok(())
}
