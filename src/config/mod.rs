//! Configuration module for Sumi-Scribe
//!
//! This module handles loading, parsing, and validating site configuration
//! files. TOML is the native format; files with a `.json` extension are read
//! as JSON.
//!
//! # Example
//!
//! ```no_run
//! use sumi_scribe::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site.toml")).unwrap();
//! println!("Crawling {} with {} item specs", config.name, config.items.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CandidateConfig, Config, EntryPoint, FieldConfig, ItemConfig, LinkRuleConfig, PageRange,
    PipelineConfig, RequestConfig, RetryConfig, MAX_TIMEOUT_S,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, PAGE_TOKEN};
