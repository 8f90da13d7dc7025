use indexmap::IndexMap;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for one site
///
/// Multi-word keys are kebab-case in TOML; the snake_case spelling used by
/// JSON site configs is accepted as an alias.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Site name, used in logs and the run summary
    pub name: String,

    /// Base URL of the site
    #[serde(alias = "base_url")]
    pub base_url: String,

    /// Where the crawl starts
    pub entrypoints: Vec<EntryPoint>,

    /// Item specs by type name, in declaration order
    pub items: IndexMap<String, ItemConfig>,

    /// Explicit link-following rules (empty means seed-only)
    #[serde(default)]
    pub links: Vec<LinkRuleConfig>,

    /// Fetch and retry options
    #[serde(default)]
    pub request: RequestConfig,

    /// Output sinks
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// A crawl entry point: a literal URL or a paged URL template
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    /// Template expanded over a page range, substituting `{{page}}`
    Template {
        #[serde(rename = "url-template", alias = "url_template")]
        url_template: String,
        range: PageRange,
    },

    /// A single URL
    Url { url: String },
}

/// Half-open page range `start..stop` walked by `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRange {
    pub start: i64,
    pub stop: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

/// Raw item spec as written in the config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ItemConfig {
    /// Regex searched in the response URL path
    #[serde(default, alias = "match_url")]
    pub match_url: Option<String>,

    /// CSS selector of the repeated container nodes
    #[serde(default, alias = "list_selector")]
    pub list_selector: Option<String>,

    /// Field specs by field name, in declaration order
    #[serde(default)]
    pub fields: IndexMap<String, FieldConfig>,

    /// Fields whose values identify an item for deduplication
    #[serde(default, alias = "dedupe_keys")]
    pub dedupe_keys: Vec<String>,
}

/// Raw field spec
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldConfig {
    /// Literal source tag such as `response.url`
    #[serde(default)]
    pub from: Option<String>,

    /// Extraction candidates, tried in order
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,

    /// Normalize ops, applied in order
    #[serde(default)]
    pub normalize: Vec<String>,
}

/// Raw extraction candidate: exactly one of `css` or `regex`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateConfig {
    #[serde(default)]
    pub css: Option<String>,

    #[serde(default)]
    pub regex: Option<String>,

    /// Extraction mode: `text` (default), `html` or `list`
    #[serde(default, rename = "as")]
    pub mode: Option<String>,
}

/// Raw link-following rule
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LinkRuleConfig {
    /// Selector of the link nodes, optionally with `::attr(name)`
    pub css: String,

    /// Regex the response URL path must contain for the rule to apply
    #[serde(default, alias = "match_url")]
    pub match_url: Option<String>,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RequestConfig {
    /// Per-request timeout in seconds
    #[serde(alias = "timeout_s")]
    pub timeout_s: f64,

    /// Whether TLS certificates are verified; when false, certificate
    /// failures are retried once without verification
    pub verify: bool,

    /// User agent override
    #[serde(alias = "user_agent")]
    pub user_agent: Option<String>,

    /// Extra headers sent with every request
    pub headers: IndexMap<String, String>,

    /// Retry policy
    pub retry: RetryConfig,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_s: 15.0,
            verify: true,
            user_agent: None,
            headers: IndexMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// Largest accepted `timeout_s`: one day
pub const MAX_TIMEOUT_S: f64 = 86_400.0;

impl RequestConfig {
    /// The per-request timeout as a `Duration`
    ///
    /// Values validation would reject fall back to the 15 second default.
    pub fn timeout(&self) -> Duration {
        if self.timeout_s > 0.0 && self.timeout_s <= MAX_TIMEOUT_S {
            Duration::try_from_secs_f64(self.timeout_s).unwrap_or(Duration::from_secs(15))
        } else {
            Duration::from_secs(15)
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    /// Attempts after which a failing request is dropped
    #[serde(alias = "max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Output sink configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineConfig {
    /// Append records to a CSV file
    Csv { path: String },

    /// Upsert records into a SQLite table
    #[serde(alias = "db")]
    Sqlite {
        /// `sqlite:///path/to/file.db`
        #[serde(default)]
        dsn: Option<String>,

        /// Database path, used when no `dsn` is given
        #[serde(default)]
        path: Option<String>,

        #[serde(default = "default_table")]
        table: String,

        #[serde(default, rename = "upsert-keys", alias = "upsert_keys")]
        upsert_keys: Vec<String>,
    },
}

fn default_table() -> String {
    "items".to_string()
}

impl PipelineConfig {
    /// Short name of the sink type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Csv { .. } => "csv",
            Self::Sqlite { .. } => "sqlite",
        }
    }
}
