//! Run statistics
//!
//! This module provides the counters a crawl run keeps and the summary
//! printed when it ends.

use chrono::{DateTime, Utc};

/// Counters for one crawl run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Site name from the config
    pub name: String,

    /// SHA-256 of the config file, when loaded from disk
    pub config_hash: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Fetches that produced a response
    pub requests_succeeded: u64,

    /// Fetches that failed (every failed attempt counts)
    pub requests_errored: u64,

    /// Requests dropped after exhausting their attempts
    pub requests_dropped: u64,

    /// Raw items produced by the extractor
    pub items_parsed: u64,

    /// Items handed to the sinks
    pub items_emitted: u64,

    /// Items suppressed by dedupe
    pub items_duplicate: u64,

    /// Items dropped because a normalize op failed
    pub normalize_errors: u64,

    /// Failed sink writes (one per sink per record)
    pub sink_errors: u64,
}

impl RunSummary {
    /// Starts a fresh summary for a site
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_hash: None,
            started_at: Utc::now(),
            finished_at: None,
            requests_succeeded: 0,
            requests_errored: 0,
            requests_dropped: 0,
            items_parsed: 0,
            items_emitted: 0,
            items_duplicate: 0,
            normalize_errors: 0,
            sink_errors: 0,
        }
    }

    /// Marks the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Run duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Errors of any kind recorded during the run
    pub fn total_errors(&self) -> u64 {
        self.requests_errored + self.normalize_errors + self.sink_errors
    }

    /// The one-line run summary
    pub fn summary_line(&self) -> String {
        format!(
            "parsed {} items, emitted {}, successes={}, errors={}",
            self.items_parsed, self.items_emitted, self.requests_succeeded, self.requests_errored
        )
    }
}

/// Prints a run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== {} ===", summary.name);
    println!("{}", summary.summary_line());

    println!("  Requests dropped:   {}", summary.requests_dropped);
    println!("  Duplicate items:    {}", summary.items_duplicate);
    println!("  Normalize errors:   {}", summary.normalize_errors);
    println!("  Sink errors:        {}", summary.sink_errors);

    if let Some(seconds) = summary.duration_seconds() {
        println!("  Duration:           {:.1}s", seconds);
    }
    if let Some(hash) = &summary.config_hash {
        println!("  Config hash:        {}", hash);
    }
    println!();
}
