//! Extracted items and the records handed to sinks

mod value;

pub use value::Value;

use indexmap::IndexMap;

/// A record as seen by sinks: field name to value, in spec order
pub type Record = IndexMap<String, Value>;

/// One extracted record together with its item type tag
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Name of the item spec that produced this item
    pub type_tag: String,

    /// Field values, in the order the spec declares them
    pub fields: Record,
}

impl Item {
    /// Creates an empty item for the given type
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields: Record::new(),
        }
    }

    /// Gets a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field value, keeping the original position if it already exists
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Strips the type tag, producing the record handed to sinks
    pub fn into_record(self) -> Record {
        self.fields
    }
}
