// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use dotenvy::dotenv;
use thiserror::Error;

/// Fraction of each sale credited to the seller, in percent.
pub const DEFAULT_SELLER_SHARE_PERCENT: u8 = 80;

/// Number of materials per catalog page.
pub const CATALOG_PAGE_SIZE: i64 = 12;

/// File extensions accepted for uploads.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "zip", "pptx", "docx", "txt", "png", "jpg", "jpeg"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub seller_share_percent: u8,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 86_400)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let seller_share_percent = parsed("SELLER_SHARE_PERCENT", DEFAULT_SELLER_SHARE_PERCENT)?;
        if seller_share_percent > 100 {
            return Err(ConfigError::Invalid {
                name: "SELLER_SHARE_PERCENT",
                value: seller_share_percent.to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            seller_share_percent,
            bind_addr: parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
