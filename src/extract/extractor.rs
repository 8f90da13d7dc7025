use crate::config::Config;
use crate::crawler::Response;
use crate::extract::candidate::{Candidate, Scope};
use crate::extract::links::{self, LinkRule};
use crate::extract::spec::{compile_items, FieldSource, ItemSpec, ItemSpecs};
use crate::item::{Item, Value};
use crate::ConfigError;
use scraper::Html;
use url::Url;

/// Everything one response yields
#[derive(Debug, Default)]
pub struct Extraction {
    /// Absolute URLs found by the link rules
    pub links: Vec<String>,

    /// Raw, not yet normalized items
    pub items: Vec<Item>,
}

/// Applies compiled item specs and link rules to responses
#[derive(Debug, Clone)]
pub struct Extractor {
    specs: ItemSpecs,
    link_rules: Vec<LinkRule>,
}

impl Extractor {
    /// Compiles the item specs and link rules of a config
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let specs = compile_items(&config.items)?;
        let link_rules = config
            .links
            .iter()
            .map(LinkRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_parts(specs, link_rules))
    }

    /// Builds an extractor from already compiled parts
    pub fn from_parts(specs: ItemSpecs, link_rules: Vec<LinkRule>) -> Self {
        Self { specs, link_rules }
    }

    /// The compiled item specs, in declaration order
    pub fn specs(&self) -> &ItemSpecs {
        &self.specs
    }

    /// Looks up the spec for an item type
    pub fn spec(&self, type_tag: &str) -> Option<&ItemSpec> {
        self.specs.get(type_tag)
    }

    /// Extracts items and follow-up links from a response
    ///
    /// Specs are tried in declaration order. A spec with a `list_selector`
    /// yields one item per container (zero containers, zero items); without
    /// one it yields at most one item for the whole document, and none when
    /// every field came out `Null`.
    pub fn parse(&self, response: &Response) -> Extraction {
        let document = Html::parse_document(&response.text);
        let base_url = Url::parse(&response.url).ok();
        let path = base_url
            .as_ref()
            .map_or(response.url.as_str(), |url| url.path());

        let mut items = Vec::new();

        for spec in self.specs.values() {
            if !spec.matches_path(path) {
                continue;
            }

            match &spec.list_selector {
                Some(selector) => {
                    let before = items.len();
                    for node in document.select(selector) {
                        items.push(extract_item(spec, &Scope::Node(node), response));
                    }
                    tracing::debug!(
                        stage = "extract",
                        url = %response.url,
                        "{}: {} containers",
                        spec.name,
                        items.len() - before
                    );
                }
                None => {
                    let scope = Scope::Document {
                        html: &document,
                        raw: &response.text,
                    };
                    let item = extract_item(spec, &scope, response);
                    if item.fields.values().any(|value| !value.is_null()) {
                        items.push(item);
                    } else {
                        tracing::debug!(
                            stage = "extract",
                            url = %response.url,
                            "{}: every field is null, skipping",
                            spec.name
                        );
                    }
                }
            }
        }

        let links = match &base_url {
            Some(base_url) => links::discover(&self.link_rules, &document, base_url),
            None => Vec::new(),
        };

        Extraction { links, items }
    }
}

fn extract_item(spec: &ItemSpec, scope: &Scope<'_>, response: &Response) -> Item {
    let mut item = Item::new(&spec.name);

    for field in &spec.fields {
        let value = match &field.source {
            FieldSource::Tag(tag) => tag.resolve(response),
            FieldSource::Candidates(candidates) => first_hit(candidates, scope, &field.name),
        };
        item.set(field.name.clone(), value);
    }

    item
}

/// Returns the value of the first candidate that hits, or `Null`
fn first_hit(candidates: &[Candidate], scope: &Scope<'_>, field: &str) -> Value {
    for (index, candidate) in candidates.iter().enumerate() {
        match candidate.evaluate(scope) {
            Ok(value) => return value,
            Err(miss) => {
                tracing::trace!("Field '{}' candidate {} missed: {}", field, index, miss);
            }
        }
    }
    Value::Null
}
