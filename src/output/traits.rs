//! Sink trait and error types
//!
//! This module defines the trait interface for output sinks and the errors
//! they can raise.

use crate::item::Record;
use thiserror::Error;

/// Errors that can occur while emitting records
///
/// Sink errors are logged and counted by the coordinator; they never stop the
/// crawl or reach the scheduler.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid sink configuration: {0}")]
    Config(String),

    #[error("Record does not fit the sink schema: {0}")]
    Schema(String),
}

impl SinkError {
    /// Short error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
            Self::Sqlite(_) => "sqlite",
            Self::Config(_) => "config",
            Self::Schema(_) => "schema",
        }
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Trait for output sink implementations
///
/// Sinks are owned exclusively by the coordinator and receive records one at
/// a time, in emission order.
pub trait Sink: Send {
    /// Short name used in logs (`csv`, `sqlite`)
    fn name(&self) -> &str;

    /// Writes one record
    fn emit(&mut self, record: &Record) -> SinkResult<()>;

    /// Flushes buffered output; called once at the end of a run
    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }
}
