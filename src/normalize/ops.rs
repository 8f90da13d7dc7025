//! Normalize op parsing and evaluation

use crate::item::Value;
use crate::normalize::NormalizeError;
use crate::ConfigError;
use chrono::format::{Item as FormatItem, StrftimeItems};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

/// A single normalize op, parsed once from its config string
///
/// Config strings have the form `name` or `name:argument`, e.g. `trim`,
/// `to_datetime:%Y-%m-%d %H:%M` or `split:/->1`.
#[derive(Debug, Clone)]
pub enum NormalizeOp {
    Trim,
    Lower,
    ToInt,
    ToFloat,
    /// strftime-style format
    ToDateTime(String),
    ToTz(Tz),
    SanitizeHtml,
    /// Reserved for site-specific ad removal; currently identity
    StripAds,
    Split {
        sep: String,
        index: i64,
    },
    /// Separator with escape sequences already decoded
    Join(String),
    RegexExtract(Regex),
    /// Unrecognized op name, kept so config evolution stays non-breaking
    Unknown(String),
}

impl NormalizeOp {
    /// Parses an op string from the config
    ///
    /// Unknown op names parse to [`NormalizeOp::Unknown`]. Known ops with a
    /// missing or malformed argument are a configuration error.
    pub fn parse(op: &str) -> Result<Self, ConfigError> {
        let (name, arg) = match op.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (op, None),
        };

        let parsed = match (name, arg) {
            ("trim", None) => Self::Trim,
            ("lower", None) => Self::Lower,
            ("to_int", None) => Self::ToInt,
            ("to_float", None) => Self::ToFloat,
            ("sanitize_html", None) => Self::SanitizeHtml,
            ("strip_ads", None) => Self::StripAds,
            ("to_datetime", Some(format)) => {
                let invalid =
                    StrftimeItems::new(format).any(|item| matches!(item, FormatItem::Error));
                if format.is_empty() || invalid {
                    return Err(invalid_op(op, "invalid datetime format"));
                }
                Self::ToDateTime(format.to_string())
            }
            ("to_tz", Some(zone)) => {
                let tz = zone
                    .parse::<Tz>()
                    .map_err(|e| invalid_op(op, &format!("unknown time zone: {}", e)))?;
                Self::ToTz(tz)
            }
            ("split", Some(spec)) => {
                let (sep, index) = spec
                    .rsplit_once("->")
                    .ok_or_else(|| invalid_op(op, "expected split:<sep>-><index>"))?;
                if sep.is_empty() {
                    return Err(invalid_op(op, "separator cannot be empty"));
                }
                let index = index
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid_op(op, "index must be an integer"))?;
                Self::Split {
                    sep: sep.to_string(),
                    index,
                }
            }
            ("join", Some(sep)) => Self::Join(decode_escapes(sep)),
            ("regex_extract", Some(pattern)) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| invalid_op(op, &format!("invalid regex: {}", e)))?;
                Self::RegexExtract(regex)
            }
            ("to_datetime" | "to_tz" | "split" | "join" | "regex_extract", None) => {
                return Err(invalid_op(op, "missing argument"));
            }
            _ => Self::Unknown(op.to_string()),
        };

        Ok(parsed)
    }

    /// Applies this op to a value
    ///
    /// `Null` passes through every op unchanged.
    pub fn apply(&self, value: Value) -> Result<Value, NormalizeError> {
        if value.is_null() {
            return Ok(value);
        }

        let normalized = match self {
            Self::Trim => map_str(value, |s| s.trim().to_string()),
            Self::Lower => map_str(value, |s| s.to_lowercase()),
            Self::ToInt => to_int(value),
            Self::ToFloat => to_float(value),
            Self::ToDateTime(format) => to_datetime(value, format)?,
            Self::ToTz(tz) => to_tz(value, *tz),
            Self::SanitizeHtml => {
                map_str(value, |s| script_regex().replace_all(s, "").into_owned())
            }
            Self::StripAds => value,
            Self::Split { sep, index } => split(value, sep, *index),
            Self::Join(sep) => match value {
                Value::List(values) => Value::Str(
                    values
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(sep),
                ),
                other => other,
            },
            Self::RegexExtract(regex) => {
                let text = value.to_string();
                match first_group_or_match(regex, &text) {
                    Some(found) => Value::Str(found),
                    None => value,
                }
            }
            Self::Unknown(_) => value,
        };

        Ok(normalized)
    }
}

fn invalid_op(op: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidPattern(format!("normalize op '{}': {}", op, reason))
}

/// Maps string values, leaving every other kind unchanged
fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Str(s) => Value::Str(f(&s)),
        other => other,
    }
}

fn script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<script.*?>.*?</script>").expect("static regex"))
}

fn int_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+").expect("static regex"))
}

fn float_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").expect("static regex"))
}

/// First capture group if the pattern has one, otherwise the whole match
pub(crate) fn first_group_or_match(regex: &Regex, text: &str) -> Option<String> {
    let caps = regex.captures(text)?;
    let found = if regex.captures_len() > 1 {
        caps.get(1)?
    } else {
        caps.get(0)?
    };
    Some(found.as_str().to_string())
}

fn to_int(value: Value) -> Value {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| {
                int_regex()
                    .find(&s)
                    .and_then(|m| m.as_str().parse::<i64>().ok())
            })
            .map(Value::Int)
            .unwrap_or(Value::Str(s)),
        Value::Float(x) if x.is_finite() => Value::Int(x.trunc() as i64),
        other => other,
    }
}

fn to_float(value: Value) -> Value {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| {
                float_regex()
                    .find(&s)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
            })
            .map(Value::Float)
            .unwrap_or(Value::Str(s)),
        Value::Int(i) => Value::Float(i as f64),
        other => other,
    }
}

fn to_datetime(value: Value, format: &str) -> Result<Value, NormalizeError> {
    let s = match value {
        Value::Str(s) => s,
        other => {
            return Err(NormalizeError::NotAString {
                op: "to_datetime",
                kind: other.kind(),
            })
        }
    };

    let mismatch = || NormalizeError::DateTimeFormat {
        value: s.clone(),
        format: format.to_string(),
    };

    if format.contains("%z") || format.contains("%:z") {
        return DateTime::parse_from_str(&s, format)
            .map(Value::Zoned)
            .map_err(|_| mismatch());
    }

    if let Ok(ts) = NaiveDateTime::parse_from_str(&s, format) {
        return Ok(Value::Timestamp(ts));
    }

    // Date-only formats land on midnight, time-only formats on 1900-01-01
    if let Some(ts) = NaiveDate::parse_from_str(&s, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Value::Timestamp(ts));
    }

    if let Ok(time) = NaiveTime::parse_from_str(&s, format) {
        if let Some(date) = NaiveDate::from_ymd_opt(1900, 1, 1) {
            return Ok(Value::Timestamp(date.and_time(time)));
        }
    }

    Err(mismatch())
}

/// Attaches the zone to the wall-clock time, replacing any existing offset
fn to_tz(value: Value, tz: Tz) -> Value {
    let naive = match value {
        Value::Timestamp(ts) => ts,
        Value::Zoned(ts) => ts.naive_local(),
        other => return other,
    };

    let offset = match tz.offset_from_local_datetime(&naive) {
        LocalResult::Single(offset) => offset.fix(),
        LocalResult::Ambiguous(earliest, _) => earliest.fix(),
        // Wall-clock time inside a DST gap
        LocalResult::None => tz.offset_from_utc_datetime(&naive).fix(),
    };

    match naive.and_local_timezone(offset) {
        LocalResult::Single(zoned) => Value::Zoned(zoned),
        _ => Value::Timestamp(naive),
    }
}

fn split(value: Value, sep: &str, index: i64) -> Value {
    let s = match value {
        Value::Str(s) => s,
        other => return other,
    };

    let parts: Vec<&str> = s.split(sep).collect();
    let len = parts.len() as i64;
    let position = if index < 0 { len + index } else { index };

    if (0..len).contains(&position) {
        Value::Str(parts[position as usize].to_string())
    } else {
        Value::Str(s)
    }
}

/// Decodes backslash escapes in a join separator
///
/// Unknown escapes are kept as written.
fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
