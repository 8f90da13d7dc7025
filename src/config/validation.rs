use crate::config::types::{
    Config, EntryPoint, ItemConfig, LinkRuleConfig, PipelineConfig, RequestConfig, MAX_TIMEOUT_S,
};
use crate::ConfigError;
use url::Url;

/// Token substituted with the page number in entry point templates
pub const PAGE_TOKEN: &str = "{{page}}";

/// Validates the entire configuration
///
/// Selector, regex and normalize-op syntax is checked later, when the item
/// specs are compiled; this pass covers the structural rules.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site(config)?;
    validate_entrypoints(&config.entrypoints)?;
    validate_request_config(&config.request)?;
    validate_items(config)?;
    validate_link_rules(&config.links)?;
    validate_pipelines(&config.pipelines)?;
    Ok(())
}

/// Validates the site name and base URL
fn validate_site(config: &Config) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation("name cannot be empty".to_string()));
    }

    validate_crawl_url(&config.base_url, "base_url")?;

    Ok(())
}

/// Validates entry points
fn validate_entrypoints(entrypoints: &[EntryPoint]) -> Result<(), ConfigError> {
    if entrypoints.is_empty() {
        return Err(ConfigError::Validation(
            "at least one entry point is required".to_string(),
        ));
    }

    for entry in entrypoints {
        match entry {
            EntryPoint::Url { url } => validate_crawl_url(url, "entry point")?,
            EntryPoint::Template {
                url_template,
                range,
            } => {
                if !url_template.contains(PAGE_TOKEN) {
                    return Err(ConfigError::Validation(format!(
                        "url_template '{}' must contain {}",
                        url_template, PAGE_TOKEN
                    )));
                }

                if range.step == 0 {
                    return Err(ConfigError::Validation(format!(
                        "range step for '{}' cannot be 0",
                        url_template
                    )));
                }

                let sample = url_template.replace(PAGE_TOKEN, &range.start.to_string());
                validate_crawl_url(&sample, "url_template")?;
            }
        }
    }

    Ok(())
}

/// Validates fetch and retry options
fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if !(config.timeout_s > 0.0 && config.timeout_s <= MAX_TIMEOUT_S) {
        return Err(ConfigError::Validation(format!(
            "timeout_s must be in (0, {}] seconds, got {}",
            MAX_TIMEOUT_S, config.timeout_s
        )));
    }

    if config.retry.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.retry.max_attempts
        )));
    }

    Ok(())
}

/// Validates item specs at the structural level
fn validate_items(config: &Config) -> Result<(), ConfigError> {
    if config.items.is_empty() {
        return Err(ConfigError::Validation(
            "at least one item spec is required".to_string(),
        ));
    }

    for (name, item) in &config.items {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "item type name cannot be empty".to_string(),
            ));
        }

        warn_undeclared_dedupe_keys(name, item);
    }

    Ok(())
}

/// Dedupe keys naming undeclared fields always read as null
fn warn_undeclared_dedupe_keys(name: &str, item: &ItemConfig) {
    for key in &item.dedupe_keys {
        if !item.fields.contains_key(key) {
            tracing::warn!(
                "Item '{}' dedupe key '{}' is not a declared field; it will always be null",
                name,
                key
            );
        }
    }
}

/// Validates link-following rules
fn validate_link_rules(rules: &[LinkRuleConfig]) -> Result<(), ConfigError> {
    for rule in rules {
        if rule.css.trim().is_empty() {
            return Err(ConfigError::Validation(
                "link rule css cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates sink configuration
fn validate_pipelines(pipelines: &[PipelineConfig]) -> Result<(), ConfigError> {
    for pipeline in pipelines {
        match pipeline {
            PipelineConfig::Csv { path } => {
                if path.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "csv pipeline path cannot be empty".to_string(),
                    ));
                }
            }
            PipelineConfig::Sqlite {
                dsn,
                path,
                table,
                upsert_keys,
            } => {
                if let Some(dsn) = dsn {
                    if !dsn.starts_with("sqlite:///") {
                        return Err(ConfigError::Validation(format!(
                            "unsupported dsn '{}': only sqlite:/// is supported",
                            dsn
                        )));
                    }
                }

                if dsn.is_none() && path.as_deref().map_or(false, |p| p.trim().is_empty()) {
                    return Err(ConfigError::Validation(
                        "sqlite pipeline path cannot be empty".to_string(),
                    ));
                }

                validate_identifier(table, "table")?;
                for key in upsert_keys {
                    validate_identifier(key, "upsert key")?;
                }
            }
        }
    }
    Ok(())
}

/// Validates a URL the crawler can fetch (http, https or file)
fn validate_crawl_url(url: &str, what: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, url, e)))?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(()),
        scheme => Err(ConfigError::InvalidUrl(format!(
            "Invalid {} '{}': unsupported scheme '{}'",
            what, url, scheme
        ))),
    }
}

/// Validates a plain SQL identifier: letters, digits and underscores, not
/// starting with a digit
fn validate_identifier(ident: &str, what: &str) -> Result<(), ConfigError> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must be a plain identifier",
            what, ident
        )));
    }

    Ok(())
}
