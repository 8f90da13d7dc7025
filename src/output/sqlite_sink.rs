//! SQLite sink
//!
//! Records are written to a single table created from the first record's
//! field names. With `upsert_keys` the table carries a UNIQUE constraint over
//! those columns and rows are upserted; without them every record is a plain
//! insert.

use crate::item::{Record, Value};
use crate::output::traits::{Sink, SinkError, SinkResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::{Path, PathBuf};

/// DSN prefix accepted for SQLite databases
const DSN_PREFIX: &str = "sqlite:///";

/// Database file used when neither `dsn` nor `path` is configured
const DEFAULT_DB_PATH: &str = "crawler.db";

/// Resolves the database file from the pipeline's `dsn` or `path`
pub fn resolve_db_path(dsn: Option<&str>, path: Option<&str>) -> SinkResult<PathBuf> {
    match (dsn, path) {
        (Some(dsn), _) => dsn
            .strip_prefix(DSN_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| SinkError::Config(format!("unsupported dsn '{}'", dsn))),
        (None, Some(path)) => Ok(PathBuf::from(path)),
        (None, None) => Ok(PathBuf::from(DEFAULT_DB_PATH)),
    }
}

/// Upserting SQLite writer
pub struct SqliteSink {
    conn: Connection,
    table: String,
    upsert_keys: Vec<String>,

    /// Column order, fixed by the first record
    columns: Option<Vec<String>>,

    /// Insert statement for `columns`
    insert_sql: String,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path, table: &str, upsert_keys: Vec<String>) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        tracing::debug!("Opened SQLite output {} (table {})", path.display(), table);
        Ok(Self::with_connection(conn, table, upsert_keys))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(table: &str, upsert_keys: Vec<String>) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::with_connection(conn, table, upsert_keys))
    }

    fn with_connection(conn: Connection, table: &str, upsert_keys: Vec<String>) -> Self {
        Self {
            conn,
            table: table.to_string(),
            upsert_keys,
            columns: None,
            insert_sql: String::new(),
        }
    }

    /// Creates the table for the first record's columns
    fn ensure_table(&mut self, record: &Record) -> SinkResult<()> {
        let columns: Vec<String> = record.keys().cloned().collect();

        if columns.is_empty() {
            return Err(SinkError::Schema("record has no fields".to_string()));
        }

        if let Some(missing) = self.upsert_keys.iter().find(|key| !columns.contains(key)) {
            return Err(SinkError::Schema(format!(
                "upsert key '{}' is not a record field",
                missing
            )));
        }

        let mut definitions: Vec<String> = columns
            .iter()
            .map(|column| format!("{} TEXT", quote_ident(column)))
            .collect();
        if !self.upsert_keys.is_empty() {
            definitions.push(format!("UNIQUE({})", quoted_list(&self.upsert_keys)));
        }

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table),
            definitions.join(", ")
        );
        self.conn.execute_batch(&create_sql)?;

        self.insert_sql = build_insert_sql(&self.table, &columns, &self.upsert_keys);
        self.columns = Some(columns);
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn emit(&mut self, record: &Record) -> SinkResult<()> {
        if self.columns.is_none() {
            self.ensure_table(record)?;
        }

        let columns = self.columns.as_deref().unwrap_or_default();

        if let Some(extra) = record.keys().find(|key| !columns.contains(key)) {
            return Err(SinkError::Schema(format!(
                "field '{}' is not a column of {}",
                extra, self.table
            )));
        }

        let values = columns
            .iter()
            .map(|column| to_sql_value(record.get(column).unwrap_or(&Value::Null)));

        self.conn.execute(&self.insert_sql, params_from_iter(values))?;
        Ok(())
    }
}

/// Builds the insert (or upsert) statement for a column set
fn build_insert_sql(table: &str, columns: &[String], upsert_keys: &[String]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted_list(columns),
        placeholders.join(", ")
    );

    if !upsert_keys.is_empty() {
        let updates: Vec<String> = columns
            .iter()
            .filter(|column| !upsert_keys.contains(column))
            .map(|column| format!("{0} = excluded.{0}", quote_ident(column)))
            .collect();

        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", quoted_list(upsert_keys)));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                quoted_list(upsert_keys),
                updates.join(", ")
            ));
        }
    }

    sql
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quoted_list(idents: &[String]) -> String {
    idents
        .iter()
        .map(|ident| quote_ident(ident))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps a field value onto a SQLite value
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Str(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
