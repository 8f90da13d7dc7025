//! Crawler module for fetching and driving the pipeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP and file fetching
//! - Request scheduling and the retry policy
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, default_user_agent, Fetch, FetchError, HttpFetcher, Response,
};
pub use scheduler::{expand_entrypoint, DeferOutcome, Request, Scheduler};

use crate::config::Config;
use crate::output::RunSummary;
use crate::Result;

/// Runs a complete crawl operation
///
/// This is the main entry point for crawling one site. It will:
/// 1. Compile the item specs and link rules
/// 2. Build the HTTP client and the sinks
/// 3. Seed the frontier from the entry points
/// 4. Fetch, extract, normalize, dedupe and emit until the frontier is empty
///
/// # Arguments
///
/// * `config` - The site configuration
///
/// # Returns
///
/// The run summary, or the configuration error that stopped the run before
/// any fetch
pub async fn crawl(config: &Config) -> Result<RunSummary> {
    run_crawl(config, false).await
}
