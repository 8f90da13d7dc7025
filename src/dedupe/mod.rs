//! Item deduplication
//!
//! Each item type declares `dedupe_keys`; the values of those fields form the
//! item's identity. The set of seen identities lives in an explicit [`Dedupe`]
//! instance owned by one crawl run.

use crate::extract::ItemSpecs;
use crate::item::{Item, Value};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::collections::{HashMap, HashSet};

/// Hashable projection of a [`Value`]
///
/// Floats are keyed by their bit pattern, so `0.0` and `-0.0` are distinct
/// and NaN equals itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Str(String),
    Int(i64),
    Float(u64),
    List(Vec<KeyPart>),
    Timestamp(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Str(s) => Self::Str(s.clone()),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(f.to_bits()),
            Value::List(values) => Self::List(values.iter().map(Self::from).collect()),
            Value::Timestamp(ts) => Self::Timestamp(*ts),
            Value::Zoned(ts) => Self::Zoned(*ts),
        }
    }
}

type DedupeKey = Vec<KeyPart>;

/// Seen-key sets per item type
#[derive(Debug, Default)]
pub struct Dedupe {
    /// Key fields per item type
    keys: HashMap<String, Vec<String>>,

    /// Keys seen so far per item type
    seen: HashMap<String, HashSet<DedupeKey>>,

    /// Item types already warned about having no usable key
    warned: HashSet<String>,
}

impl Dedupe {
    /// Creates an empty dedupe state for the given item specs
    pub fn new(specs: &ItemSpecs) -> Self {
        let keys = specs
            .values()
            .map(|spec| (spec.name.clone(), spec.dedupe_keys.clone()))
            .collect();

        Self {
            keys,
            ..Default::default()
        }
    }

    /// Checks an item and records its key
    ///
    /// Returns false the first time a key is seen for a type and true for
    /// every repeat. An item whose type is unknown is never a duplicate. An
    /// item with no usable key (no `dedupe_keys`, or every key value null or
    /// empty) always counts as a duplicate, so nothing unidentifiable reaches
    /// the sinks.
    pub fn is_duplicate(&mut self, item: &Item) -> bool {
        let Some(key_fields) = self.keys.get(&item.type_tag) else {
            return false;
        };

        let values: Vec<&Value> = key_fields
            .iter()
            .map(|field| item.get(field).unwrap_or(&Value::Null))
            .collect();

        if values.iter().all(|value| value.is_empty()) {
            if self.warned.insert(item.type_tag.clone()) {
                tracing::warn!(
                    stage = "dedupe",
                    kind = "empty_key",
                    "Item type '{}' has no usable dedupe key; dropping such items",
                    item.type_tag
                );
            }
            return true;
        }

        let key: DedupeKey = values.into_iter().map(KeyPart::from).collect();

        !self
            .seen
            .entry(item.type_tag.clone())
            .or_default()
            .insert(key)
    }

    /// Number of distinct keys recorded for an item type
    pub fn seen_count(&self, type_tag: &str) -> usize {
        self.seen.get(type_tag).map_or(0, HashSet::len)
    }
}
