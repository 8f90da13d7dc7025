//! Link discovery
//!
//! Links are only followed when the config opts in with `[[links]]` rules.
//! Each rule selects nodes with a CSS expression (by default reading `href`)
//! and may restrict the pages it runs on with a `match_url` regex.

use crate::config::LinkRuleConfig;
use crate::extract::candidate::{split_pseudo, Target};
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// A compiled link-following rule
#[derive(Debug, Clone)]
pub struct LinkRule {
    css: String,
    selector: Selector,
    attr: String,
    match_url: Option<Regex>,
}

impl LinkRule {
    /// Compiles a link rule config
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidPattern` for an unparsable selector or regex, or
    /// for a `::text` target (links are always read from an attribute).
    pub fn compile(config: &LinkRuleConfig) -> Result<Self, ConfigError> {
        let (base, target) = split_pseudo(&config.css);

        let attr = match target {
            None => "href".to_string(),
            Some(Target::Attr(name)) if !name.is_empty() => name,
            Some(_) => {
                return Err(ConfigError::InvalidPattern(format!(
                    "link rule '{}' must read an attribute",
                    config.css
                )))
            }
        };

        let selector = Selector::parse(base).map_err(|e| {
            ConfigError::InvalidPattern(format!("invalid link selector '{}': {}", config.css, e))
        })?;

        let match_url = config
            .match_url
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::InvalidPattern(format!("invalid link match_url: {}", e)))?;

        Ok(Self {
            css: config.css.clone(),
            selector,
            attr,
            match_url,
        })
    }

    /// Returns true if this rule runs on a page with the given URL path
    pub fn applies_to(&self, path: &str) -> bool {
        self.match_url
            .as_ref()
            .map_or(true, |regex| regex.is_match(path))
    }

    /// Collects the absolute URLs this rule finds in a document
    pub fn collect(&self, document: &Html, base_url: &Url) -> Vec<String> {
        let links: Vec<String> = document
            .select(&self.selector)
            .filter_map(|element| element.value().attr(&self.attr))
            .filter_map(|href| resolve_link(href, base_url))
            .collect();

        tracing::trace!("Link rule '{}' found {} links", self.css, links.len());
        links
    }
}

/// Runs every applicable rule over a document, keeping first-seen order
pub fn discover(rules: &[LinkRule], document: &Html, base_url: &Url) -> Vec<String> {
    let path = base_url.path();
    let mut links: Vec<String> = Vec::new();

    for rule in rules.iter().filter(|rule| rule.applies_to(path)) {
        for link in rule.collect(document, base_url) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - invalid URLs, or anything not http, https or file after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    absolute_url.set_fragment(None);

    match absolute_url.scheme() {
        "http" | "https" | "file" => Some(absolute_url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(css: &str, match_url: Option<&str>) -> LinkRule {
        LinkRule::compile(&LinkRuleConfig {
            css: css.to_string(),
            match_url: match_url.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_link_relative() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();

        assert_eq!(
            resolve_link("other.html", &base),
            Some("https://example.com/dir/other.html".to_string())
        );
        assert_eq!(
            resolve_link("/root.html", &base),
            Some("https://example.com/root.html".to_string())
        );
        assert_eq!(
            resolve_link("?start=25", &base),
            Some("https://example.com/dir/page.html?start=25".to_string())
        );
    }

    #[test]
    fn test_resolve_link_strips_fragment() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            resolve_link("/a#top", &base),
            Some("https://example.com/a".to_string())
        );
    }

    #[test]
    fn test_resolve_link_excludes_special_schemes() {
        let base = Url::parse("https://example.com/").unwrap();

        assert_eq!(resolve_link("javascript:void(0)", &base), None);
        assert_eq!(resolve_link("mailto:test@example.com", &base), None);
        assert_eq!(resolve_link("tel:+1234567890", &base), None);
        assert_eq!(resolve_link("data:text/html,<h1>Hi</h1>", &base), None);
        assert_eq!(resolve_link("#section", &base), None);
        assert_eq!(resolve_link("ftp://example.com/file", &base), None);
        assert_eq!(resolve_link("   ", &base), None);
    }

    #[test]
    fn test_resolve_link_file_scheme() {
        let base = Url::parse("file:///tmp/site/index.html").unwrap();
        assert_eq!(
            resolve_link("page2.html", &base),
            Some("file:///tmp/site/page2.html".to_string())
        );
    }

    #[test]
    fn test_rule_defaults_to_href() {
        let html = Html::parse_document(
            r#"<div class="paginator"><a href="?start=25">2</a><a href="?start=50">3</a></div>"#,
        );
        let base = Url::parse("https://movie.example.com/top250").unwrap();

        let links = rule("div.paginator a", None).collect(&html, &base);
        assert_eq!(
            links,
            vec![
                "https://movie.example.com/top250?start=25".to_string(),
                "https://movie.example.com/top250?start=50".to_string(),
            ]
        );
    }

    #[test]
    fn test_rule_custom_attribute() {
        let html = Html::parse_document(r#"<li data-url="/subject/1/">x</li>"#);
        let base = Url::parse("https://example.com/").unwrap();

        let links = rule("li::attr(data-url)", None).collect(&html, &base);
        assert_eq!(links, vec!["https://example.com/subject/1/".to_string()]);
    }

    #[test]
    fn test_text_target_is_rejected() {
        let result = LinkRule::compile(&LinkRuleConfig {
            css: "a::text".to_string(),
            match_url: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_discover_filters_by_path_and_dedupes() {
        let html = Html::parse_document(
            concat!(
                r#"<a class="next" href="/list?p=2">next</a>"#,
                r#"<a class="item" href="/item/1">1</a>"#,
                r#"<a class="item" href="/item/1">again</a>"#,
            ),
        );
        let rules = vec![
            rule("a.next", Some("^/list")),
            rule("a.item", None),
            rule("a.next", Some("^/item")),
        ];

        let base = Url::parse("https://example.com/list").unwrap();
        assert_eq!(
            discover(&rules, &html, &base),
            vec![
                "https://example.com/list?p=2".to_string(),
                "https://example.com/item/1".to_string(),
            ]
        );

        let base = Url::parse("https://example.com/other").unwrap();
        assert_eq!(
            discover(&rules, &html, &base),
            vec!["https://example.com/item/1".to_string()]
        );
    }
}
