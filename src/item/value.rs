//! Dynamic field values carried by extracted items

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::fmt;

/// Display format for naive timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Display format for zoned timestamps
const ZONED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// A single field value
///
/// Extraction only ever produces `Null`, `Str` and `List`; the other variants
/// come out of normalize ops (`to_int`, `to_float`, `to_datetime`, `to_tz`).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value (no candidate matched)
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    List(Vec<Value>),
    /// Timestamp without zone information
    Timestamp(NaiveDateTime),
    /// Timestamp carrying a fixed UTC offset
    Zoned(DateTime<FixedOffset>),
}

impl Value {
    /// Returns true for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true when the value counts as "no result" for extraction
    ///
    /// Absent, empty string and empty list are all empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.is_empty(),
            Self::List(values) => values.is_empty(),
            _ => false,
        }
    }

    /// Returns the string slice if this is a `Str`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in log and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::List(_) => "list",
            Self::Timestamp(_) => "timestamp",
            Self::Zoned(_) => "zoned timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::List(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                Ok(())
            }
            Self::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Self::Zoned(ts) => write!(f, "{}", ts.format(ZONED_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
