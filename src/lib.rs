//! Feed-Harvest: a paginated feed media harvester
//!
//! This crate walks a paginated content feed, classifies the media attached to
//! each post, downloads it into per-job directories, and tracks every job's
//! lifecycle through a status record the scheduler owns.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Feed-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline task failed: {0}")]
    Task(String),

    /// The only job-level failure: the walk ended without a single media file
    #[error("no valid media downloaded")]
    ZeroYield,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Feed-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Pipeline, RunReport};
pub use output::StatsRecord;
pub use state::JobState;
pub use storage::{JobDescriptor, JobStore, StatusRecord};
pub use url::{normalize_media_url, MediaKind};
