//! Compiled item specs
//!
//! The raw [`ItemConfig`] is compiled once at load time: regexes and
//! selectors are parsed, `from` tags resolved and normalize ops parsed, so the
//! per-response work never re-reads config strings.

use crate::config::{FieldConfig, ItemConfig};
use crate::crawler::Response;
use crate::extract::candidate::Candidate;
use crate::item::Value;
use crate::normalize::NormalizeOp;
use crate::ConfigError;
use indexmap::IndexMap;
use regex::Regex;
use scraper::Selector;

/// Compiled item specs by type name, in declaration order
pub type ItemSpecs = IndexMap<String, ItemSpec>;

/// How to detect and extract one record type from a document
#[derive(Debug, Clone)]
pub struct ItemSpec {
    /// Item type name (the type tag of produced items)
    pub name: String,

    /// Regex searched in the response URL path
    pub match_url: Option<Regex>,

    /// Raw container selector, used to make candidate selectors relative
    pub list_selector_expr: Option<String>,

    /// Compiled container selector
    pub list_selector: Option<Selector>,

    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,

    /// Fields whose values form the dedupe key, in order
    pub dedupe_keys: Vec<String>,
}

/// How to obtain and normalize one field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub source: FieldSource,
    pub normalize: Vec<NormalizeOp>,
}

/// Where a field value comes from
#[derive(Debug, Clone)]
pub enum FieldSource {
    /// A literal source tag; no candidates are consulted
    Tag(SourceTag),

    /// Extraction candidates, tried in order
    Candidates(Vec<Candidate>),
}

/// Literal value sources for the `from` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    /// The current response URL (`response.url`, legacy `meta.url`)
    ResponseUrl,

    /// The current response status code (`response.status`)
    ResponseStatus,
}

impl SourceTag {
    /// Parses a `from` tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "response.url" | "meta.url" => Some(Self::ResponseUrl),
            "response.status" => Some(Self::ResponseStatus),
            _ => None,
        }
    }

    /// Reads the tagged value off a response
    pub fn resolve(&self, response: &Response) -> Value {
        match self {
            Self::ResponseUrl => Value::from(response.url.as_str()),
            Self::ResponseStatus => Value::Int(i64::from(response.status)),
        }
    }
}

impl ItemSpec {
    /// Compiles a raw item config
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidItemSpec` when the spec itself is malformed: a bad
    /// `match_url` regex or `list_selector`, a field with neither `from` nor
    /// candidates, an unknown `from` tag, a candidate with neither `css` nor
    /// `regex`, or a normalize op with malformed arguments.
    ///
    /// An unparsable candidate selector is not an error; the candidate simply
    /// never yields a result.
    pub fn compile(name: &str, config: &ItemConfig) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidItemSpec {
            item: name.to_string(),
            message,
        };

        let match_url = config
            .match_url
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| invalid(format!("invalid match_url: {}", e)))?;

        let list_selector_expr = config
            .list_selector
            .as_deref()
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
            .map(str::to_string);

        let list_selector = list_selector_expr
            .as_deref()
            .map(|expr| {
                Selector::parse(expr)
                    .map_err(|e| invalid(format!("invalid list_selector '{}': {}", expr, e)))
            })
            .transpose()?;

        let mut fields = Vec::with_capacity(config.fields.len());
        for (field_name, field_config) in &config.fields {
            let field = compile_field(field_name, field_config, list_selector_expr.as_deref())
                .map_err(|message| invalid(format!("field '{}': {}", field_name, message)))?;
            fields.push(field);
        }

        Ok(Self {
            name: name.to_string(),
            match_url,
            list_selector_expr,
            list_selector,
            fields,
            dedupe_keys: config.dedupe_keys.clone(),
        })
    }

    /// Returns true if this spec applies to a response with the given URL path
    pub fn matches_path(&self, path: &str) -> bool {
        self.match_url
            .as_ref()
            .map_or(true, |regex| regex.is_match(path))
    }

    /// Looks up a field spec by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn compile_field(
    name: &str,
    config: &FieldConfig,
    container: Option<&str>,
) -> Result<FieldSpec, String> {
    let source = match config.from.as_deref() {
        Some(tag) => {
            let tag = SourceTag::parse(tag).ok_or_else(|| format!("unknown source tag '{}'", tag))?;
            FieldSource::Tag(tag)
        }
        None => {
            if config.candidates.is_empty() {
                return Err("needs either 'from' or at least one candidate".to_string());
            }
            let candidates = config
                .candidates
                .iter()
                .map(|candidate| Candidate::compile(candidate, container))
                .collect::<Result<Vec<_>, _>>()?;
            FieldSource::Candidates(candidates)
        }
    };

    let normalize = config
        .normalize
        .iter()
        .map(|op| NormalizeOp::parse(op).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::trace!("Compiled field '{}' with {} normalize ops", name, normalize.len());

    Ok(FieldSpec {
        name: name.to_string(),
        source,
        normalize,
    })
}

/// Compiles every item spec of a config, keeping declaration order
pub fn compile_items(items: &IndexMap<String, ItemConfig>) -> Result<ItemSpecs, ConfigError> {
    items
        .iter()
        .map(|(name, config)| Ok((name.clone(), ItemSpec::compile(name, config)?)))
        .collect()
}
