//! Output module for emitting records and reporting run results
//!
//! This module handles:
//! - Building the configured sinks (CSV files, SQLite tables)
//! - Writing normalized records to them
//! - Recording and printing run statistics

mod csv_sink;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use csv_sink::CsvSink;
pub use sqlite_sink::{resolve_db_path, SqliteSink};
pub use stats::{print_summary, RunSummary};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::PipelineConfig;

/// Builds one sink per configured pipeline, in config order
///
/// # Errors
///
/// Fails when a SQLite database cannot be opened or its DSN is unsupported.
pub fn build_sinks(pipelines: &[PipelineConfig]) -> SinkResult<Vec<Box<dyn Sink>>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(pipelines.len());

    for pipeline in pipelines {
        match pipeline {
            PipelineConfig::Csv { path } => {
                sinks.push(Box::new(CsvSink::new(path)));
            }
            PipelineConfig::Sqlite {
                dsn,
                path,
                table,
                upsert_keys,
            } => {
                let db_path = resolve_db_path(dsn.as_deref(), path.as_deref())?;
                sinks.push(Box::new(SqliteSink::new(
                    &db_path,
                    table,
                    upsert_keys.clone(),
                )?));
            }
        }
        tracing::debug!("Configured {} sink", pipeline.kind());
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sinks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipelines = vec![
            PipelineConfig::Sqlite {
                dsn: None,
                path: Some(dir.path().join("out.db").display().to_string()),
                table: "items".to_string(),
                upsert_keys: vec![],
            },
            PipelineConfig::Csv {
                path: dir.path().join("out.csv").display().to_string(),
            },
        ];

        let sinks = build_sinks(&pipelines).unwrap();
        let names: Vec<&str> = sinks.iter().map(|sink| sink.name()).collect();
        assert_eq!(names, vec!["sqlite", "csv"]);
    }

    #[test]
    fn test_build_sinks_empty() {
        assert!(build_sinks(&[]).unwrap().is_empty());
    }
}
