//! CSV sink
//!
//! Appends one row per record. The header comes from the first record's
//! field names and is only written when the file is empty, so repeated runs
//! keep appending to the same file.

use crate::item::Record;
use crate::output::traits::{Sink, SinkError, SinkResult};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Appending CSV writer
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    columns: Vec<String>,
}

impl CsvSink {
    /// Creates a sink writing to `path`; the file is opened on the first record
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            columns: Vec::new(),
        }
    }

    /// The output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self, record: &Record) -> SinkResult<csv::Writer<File>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        self.columns = record.keys().cloned().collect();
        if is_empty {
            writer.write_record(&self.columns)?;
        }

        tracing::debug!("Opened CSV output {}", self.path.display());
        Ok(writer)
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn emit(&mut self, record: &Record) -> SinkResult<()> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open(record)?,
        };

        let result = write_row(&mut writer, &self.columns, record);
        self.writer = Some(writer);
        result
    }

    fn finish(&mut self) -> SinkResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn write_row(
    writer: &mut csv::Writer<File>,
    columns: &[String],
    record: &Record,
) -> SinkResult<()> {
    if let Some(extra) = record.keys().find(|key| !columns.contains(key)) {
        return Err(SinkError::Schema(format!(
            "field '{}' is not a CSV column",
            extra
        )));
    }

    let row: Vec<String> = columns
        .iter()
        .map(|column| record.get(column).map(ToString::to_string).unwrap_or_default())
        .collect();

    writer.write_record(&row)?;
    writer.flush()?;
    Ok(())
}
