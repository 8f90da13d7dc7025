//! Sumi-Scribe: a configuration-driven site scraper
//!
//! A site is described declaratively (entry points, item extraction rules,
//! field normalization rules, output sinks) and this crate runs the crawl
//! pipeline for it: frontier scheduling, declarative extraction, per-field
//! normalization and item deduplication.

pub mod config;
pub mod crawler;
pub mod dedupe;
pub mod extract;
pub mod item;
pub mod normalize;
pub mod output;

use thiserror::Error;

/// Main error type for Sumi-Scribe operations
#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Frontier is empty")]
    EmptyFrontier,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// Every variant is fatal: a broken declarative contract halts the run
/// before any request is fetched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid item spec '{item}': {message}")]
    InvalidItemSpec { item: String, message: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Sumi-Scribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Request, Response, Scheduler};
pub use dedupe::Dedupe;
pub use extract::{Extractor, ItemSpec, ItemSpecs};
pub use item::{Item, Record, Value};
pub use output::RunSummary;
