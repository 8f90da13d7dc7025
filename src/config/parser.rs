use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a site configuration file from the given path
///
/// Files ending in `.json` are parsed as JSON, everything else as TOML.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_scribe::config::load_config;
///
/// let config = load_config(Path::new("site.toml")).unwrap();
/// println!("Entry points: {}", config.entrypoints.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    parse_config(&content, is_json)
}

/// Parses and validates configuration text
///
/// # Arguments
///
/// * `content` - The raw configuration document
/// * `is_json` - Parse as JSON instead of TOML
pub fn parse_config(content: &str, is_json: bool) -> Result<Config, ConfigError> {
    let config: Config = if is_json {
        serde_json::from_str(content)?
    } else {
        toml::from_str(content)?
    };

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a run can be tied to the exact config it used.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryPoint, PageRange, PipelineConfig};
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const VALID_TOML: &str = r#"
name = "quotes"
base-url = "https://quotes.toscrape.com"

[[entrypoints]]
url = "https://quotes.toscrape.com/"

[[entrypoints]]
url-template = "https://quotes.toscrape.com/page/{{page}}/"
range = { start = 2, stop = 4 }

[request]
timeout-s = 5
[request.retry]
max-attempts = 2

[items.Quote]
list-selector = "div.quote"
dedupe-keys = ["text"]

[items.Quote.fields.text]
candidates = [{ css = "span.text::text" }]
normalize = ["trim"]

[items.Quote.fields.url]
from = "response.url"

[items.Author]
match-url = "^/author/"
dedupe-keys = ["name"]

[items.Author.fields.name]
candidates = [{ css = "h3.author-title::text" }]

[[pipelines]]
type = "csv"
path = "out/quotes.csv"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_TOML);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.name, "quotes");
        assert_eq!(config.entrypoints.len(), 2);
        assert_eq!(
            config.entrypoints[1],
            EntryPoint::Template {
                url_template: "https://quotes.toscrape.com/page/{{page}}/".to_string(),
                range: PageRange {
                    start: 2,
                    stop: 4,
                    step: 1
                },
            }
        );
        assert_eq!(config.request.timeout_s, 5.0);
        assert_eq!(config.request.retry.max_attempts, 2);
        assert!(config.request.verify);
        assert_eq!(
            config.pipelines,
            vec![PipelineConfig::Csv {
                path: "out/quotes.csv".to_string()
            }]
        );
    }

    #[test]
    fn test_items_keep_declaration_order() {
        let file = create_temp_config(VALID_TOML);
        let config = load_config(file.path()).unwrap();

        let names: Vec<&str> = config.items.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Quote", "Author"]);

        let fields: Vec<&str> = config.items["Quote"]
            .fields
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(fields, vec!["text", "url"]);
    }

    #[test]
    fn test_load_json_config() {
        let json = r#"{
            "name": "quotes_demo",
            "base_url": "http://quotes.toscrape.com",
            "entrypoints": [{"url": "http://quotes.toscrape.com/page/1/"}],
            "items": {
                "Quote": {
                    "list_selector": "div.quote",
                    "dedupe_keys": ["text"],
                    "fields": {
                        "text": {"candidates": [{"css": "span.text::text"}]},
                        "tags": {"candidates": [{"css": ".tags a::text", "as": "list"}]}
                    }
                }
            },
            "request": {"retry": {"max_attempts": 5}},
            "pipelines": [{"type": "db", "dsn": "sqlite:///out.db", "upsert_keys": ["text"]}]
        }"#;

        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.base_url, "http://quotes.toscrape.com");
        assert_eq!(config.request.retry.max_attempts, 5);
        assert_eq!(config.items["Quote"].dedupe_keys, vec!["text"]);
        assert_eq!(
            config.items["Quote"].fields["tags"].candidates[0].mode.as_deref(),
            Some("list")
        );
        assert!(matches!(
            &config.pipelines[0],
            PipelineConfig::Sqlite { upsert_keys, table, .. }
                if upsert_keys == &vec!["text".to_string()] && table == "items"
        ));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/site.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let file = create_temp_config("base-url = 'https://x.com'");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_TOML.replace("max-attempts = 2", "max-attempts = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_pipeline_type() {
        let content = VALID_TOML.replace("type = \"csv\"", "type = \"kafka\"");
        let result = parse_config(&content, false);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
