//! Configuration module
//!
//! Env-var driven configuration for the API and the transfer core. Call
//! `dotenvy::dotenv()` in the binary before `Config::from_env()`.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BATCH_INACTIVITY_TIMEOUT_SECS, DEFAULT_IMAGE_PREVIEW_MAX_BYTES,
    DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
};
use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_LOCAL_STORAGE_PATH: &str = "./data/files";

/// Service configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    // Metadata store configuration
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Preview policy
    pub video_thumbnails_enabled: bool,
    pub image_preview_max_bytes: i64,
    pub ffmpeg_path: String,
    // Transfer tuning
    pub batch_inactivity_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .unwrap_or(DEFAULT_PORT),
            cors_origins,
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            video_thumbnails_enabled: env::var("VIDEO_THUMBNAILS_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            image_preview_max_bytes: env::var("IMAGE_PREVIEW_MAX_BYTES")
                .unwrap_or_else(|_| DEFAULT_IMAGE_PREVIEW_MAX_BYTES.to_string())
                .parse()
                .unwrap_or(DEFAULT_IMAGE_PREVIEW_MAX_BYTES),
            ffmpeg_path: env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string()),
            batch_inactivity_timeout: Duration::from_secs(
                env::var("BATCH_INACTIVITY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_BATCH_INACTIVITY_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_BATCH_INACTIVITY_TIMEOUT_SECS),
            ),
            stream_idle_timeout: Duration::from_secs(
                env::var("STREAM_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_STREAM_IDLE_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
