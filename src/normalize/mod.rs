//! Field normalization
//!
//! Each field of an item spec declares an ordered list of normalize ops. The
//! ops are parsed into [`NormalizeOp`] when the specs are compiled and applied
//! here, after extraction and before deduplication.

mod ops;

pub use ops::NormalizeOp;

pub(crate) use ops::first_group_or_match;

use crate::extract::ItemSpec;
use crate::item::{Item, Record};
use thiserror::Error;

/// Errors raised while normalizing a value
///
/// These signal a config/data mismatch: the item is dropped and the error is
/// counted, but the crawl continues.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("'{value}' does not match datetime format '{format}'")]
    DateTimeFormat { value: String, format: String },

    #[error("{op} expects a string, got {kind}")]
    NotAString { op: &'static str, kind: &'static str },

    #[error("field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<NormalizeError>,
    },
}

impl NormalizeError {
    /// Short error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DateTimeFormat { .. } => "datetime_format",
            Self::NotAString { .. } => "not_a_string",
            Self::Field { source, .. } => source.kind(),
        }
    }
}

/// Normalizes every field of an item using its own item spec
///
/// The returned item holds exactly the spec's fields in declaration order:
/// fields the item lacks are filled with `Null` before the ops run, fields the
/// spec does not declare are dropped.
///
/// # Errors
///
/// Returns the first op failure, wrapped with the field name. The item is
/// consumed either way.
pub fn run(item: Item, spec: &ItemSpec) -> Result<Item, NormalizeError> {
    let Item {
        type_tag,
        fields: mut raw,
    } = item;

    let mut fields = Record::with_capacity(spec.fields.len());

    for field in &spec.fields {
        let mut value = raw.shift_remove(&field.name).unwrap_or_default();

        for op in &field.normalize {
            value = op.apply(value).map_err(|e| NormalizeError::Field {
                field: field.name.clone(),
                source: Box::new(e),
            })?;
        }

        fields.insert(field.name.clone(), value);
    }

    Ok(Item { type_tag, fields })
}
