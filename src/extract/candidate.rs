//! Extraction candidates
//!
//! A candidate is one way of obtaining a field value: a CSS expression or a
//! regex. Fields try their candidates in order and keep the first that yields
//! a non-empty value.
//!
//! CSS expressions accept two pseudo-element suffixes:
//! - `sel::text` reads the text content of the matched nodes
//! - `sel::attr(name)` reads an attribute of the matched nodes
//!
//! Without a suffix the text content is read.

use crate::config::CandidateConfig;
use crate::item::Value;
use crate::normalize::first_group_or_match;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::borrow::Cow;
use thiserror::Error;

/// Why a candidate produced no value
///
/// A miss is not an error: the next candidate is tried, and a field whose
/// candidates all miss is `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionMiss {
    #[error("no node matched")]
    NoMatch,

    #[error("matched an empty value")]
    Empty,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// What to read from a matched node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Text,
    Attr(String),
}

/// How matched nodes become a value (the `as` key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Trimmed text of the first match
    #[default]
    Text,

    /// Outer HTML of the first match
    Html,

    /// Every non-empty trimmed text fragment across all matches
    List,
}

impl Mode {
    fn parse(mode: Option<&str>) -> Result<Self, String> {
        match mode.map(str::trim) {
            None | Some("") | Some("text") => Ok(Self::Text),
            Some("html") => Ok(Self::Html),
            Some("list") => Ok(Self::List),
            Some(other) => Err(format!(
                "unknown 'as' value '{}' (expected text, html or list)",
                other
            )),
        }
    }
}

/// The node set a CSS candidate selects from
#[derive(Debug, Clone)]
enum NodeSelector {
    /// The scope element itself (an empty base selector)
    Scope,
    Parsed(Selector),
    Invalid(String),
}

/// A compiled CSS candidate
#[derive(Debug, Clone)]
pub struct CssCandidate {
    selector: NodeSelector,
    target: Target,
    mode: Mode,
}

/// A compiled extraction candidate
#[derive(Debug, Clone)]
pub enum Candidate {
    Css(CssCandidate),
    Regex(Regex),
}

/// The part of a document a candidate is evaluated against
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// The whole document; regexes run on the raw response text
    Document { html: &'a Html, raw: &'a str },

    /// A single container node; regexes run on its text content
    Node(ElementRef<'a>),
}

impl<'a> Scope<'a> {
    fn select(&self, selector: &Selector) -> Vec<ElementRef<'a>> {
        match *self {
            Scope::Document { html, .. } => html.select(selector).collect(),
            Scope::Node(node) => node.select(selector).collect(),
        }
    }

    fn root(&self) -> ElementRef<'a> {
        match *self {
            Scope::Document { html, .. } => html.root_element(),
            Scope::Node(node) => node,
        }
    }

    fn text(&self) -> Cow<'a, str> {
        match *self {
            Scope::Document { raw, .. } => Cow::Borrowed(raw),
            Scope::Node(node) => Cow::Owned(node.text().collect()),
        }
    }
}

/// Splits a `::text` / `::attr(name)` suffix off a CSS expression
///
/// Returns `None` as the target when no suffix is present.
pub(crate) fn split_pseudo(expr: &str) -> (&str, Option<Target>) {
    let expr = expr.trim();

    if let Some(base) = expr.strip_suffix("::text") {
        return (base.trim(), Some(Target::Text));
    }

    if let Some((base, attr)) = expr.split_once("::attr(") {
        let name = attr.trim_end_matches(')').trim().to_string();
        return (base.trim(), Some(Target::Attr(name)));
    }

    (expr, None)
}

impl Candidate {
    /// Compiles a candidate config
    ///
    /// `container` is the item's raw `list_selector`; a CSS expression that
    /// repeats it as a prefix is made relative to the container node.
    ///
    /// # Errors
    ///
    /// Returns a message when the candidate has neither or both of `css` and
    /// `regex`, when the regex does not compile, or when `as` is unknown.
    pub fn compile(config: &CandidateConfig, container: Option<&str>) -> Result<Self, String> {
        let mode = Mode::parse(config.mode.as_deref())?;

        match (config.css.as_deref(), config.regex.as_deref()) {
            (Some(css), None) => Ok(Self::Css(CssCandidate::compile(css, container, mode))),
            (None, Some(pattern)) => Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| format!("invalid regex '{}': {}", pattern, e)),
            (Some(_), Some(_)) => Err("candidate sets both css and regex".to_string()),
            (None, None) => Err("candidate needs css or regex".to_string()),
        }
    }

    /// Evaluates the candidate against a scope
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value, ExtractionMiss> {
        let value = match self {
            Self::Css(css) => css.evaluate(scope)?,
            Self::Regex(regex) => first_group_or_match(regex, &scope.text())
                .map(Value::Str)
                .ok_or(ExtractionMiss::NoMatch)?,
        };

        if value.is_empty() {
            Err(ExtractionMiss::Empty)
        } else {
            Ok(value)
        }
    }
}

impl CssCandidate {
    fn compile(expr: &str, container: Option<&str>, mode: Mode) -> Self {
        let (base, target) = split_pseudo(expr);

        // "li" and "li span" under container "li" become "" and "span";
        // "li.active" is left alone
        let base = match container.and_then(|prefix| base.strip_prefix(prefix.trim())) {
            Some("") => "",
            Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => base,
        };

        let selector = if base.is_empty() {
            NodeSelector::Scope
        } else {
            match Selector::parse(base) {
                Ok(selector) => NodeSelector::Parsed(selector),
                Err(e) => {
                    tracing::warn!(
                        "Invalid selector '{}': {}; this candidate will never match",
                        expr,
                        e
                    );
                    NodeSelector::Invalid(e.to_string())
                }
            }
        };

        Self {
            selector,
            target: target.unwrap_or(Target::Text),
            mode,
        }
    }

    fn evaluate(&self, scope: &Scope<'_>) -> Result<Value, ExtractionMiss> {
        let nodes = match &self.selector {
            NodeSelector::Scope => vec![scope.root()],
            NodeSelector::Parsed(selector) => scope.select(selector),
            NodeSelector::Invalid(message) => {
                return Err(ExtractionMiss::InvalidSelector(message.clone()))
            }
        };

        let first = *nodes.first().ok_or(ExtractionMiss::NoMatch)?;

        let value = match (&self.target, self.mode) {
            (Target::Attr(name), Mode::List) => Value::List(
                nodes
                    .iter()
                    .filter_map(|node| node.value().attr(name))
                    .map(Value::from)
                    .collect(),
            ),
            (Target::Attr(name), _) => nodes
                .iter()
                .find_map(|node| node.value().attr(name))
                .map(Value::from)
                .unwrap_or_default(),
            (Target::Text, Mode::Html) => Value::Str(first.html()),
            (Target::Text, Mode::List) => Value::List(
                nodes
                    .iter()
                    .flat_map(|node| node.text())
                    .map(str::trim)
                    .filter(|fragment| !fragment.is_empty())
                    .map(Value::from)
                    .collect(),
            ),
            (Target::Text, Mode::Text) => {
                Value::Str(first.text().collect::<String>().trim().to_string())
            }
        };

        Ok(value)
    }
}
