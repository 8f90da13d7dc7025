//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that drives one site through the
//! pipeline:
//! - Taking requests from the frontier
//! - Fetching them and handing failures to the retry policy
//! - Extracting items and links from responses
//! - Normalizing, deduplicating and emitting items
//! - Feeding discovered links back into the frontier
//!
//! One request is fully processed before the next is taken; the fetch is the
//! only suspension point.

use crate::config::Config;
use crate::crawler::fetcher::{Fetch, HttpFetcher, Response};
use crate::crawler::scheduler::{DeferOutcome, Request, Scheduler};
use crate::dedupe::Dedupe;
use crate::extract::{Extraction, Extractor};
use crate::item::Item;
use crate::normalize;
use crate::output::{build_sinks, RunSummary, Sink};
use crate::Result;

/// Main crawler coordinator structure
///
/// Owns every piece of per-run state: frontier, dedupe sets, sinks and
/// counters.
pub struct Coordinator {
    scheduler: Scheduler,
    extractor: Extractor,
    dedupe: Dedupe,
    fetcher: Box<dyn Fetch>,
    sinks: Vec<Box<dyn Sink>>,
    summary: RunSummary,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP fetcher and the configured sinks
    ///
    /// # Arguments
    ///
    /// * `config` - The site configuration
    /// * `dry_run` - Crawl without building any sinks
    ///
    /// Item specs are compiled before any sink is opened, so a broken config
    /// leaves no database or output directory behind.
    pub fn new(config: &Config, dry_run: bool) -> Result<Self> {
        let extractor = Extractor::new(config)?;
        let fetcher = HttpFetcher::new(&config.request, &config.base_url)?;
        let sinks = if dry_run {
            tracing::info!("Dry run: no records will be written");
            Vec::new()
        } else {
            build_sinks(&config.pipelines)?
        };

        Ok(Self::assemble(config, extractor, Box::new(fetcher), sinks))
    }

    /// Creates a coordinator from explicit parts
    ///
    /// Compiles the item specs and link rules and seeds the frontier. Fails
    /// with a configuration error before anything is fetched.
    pub fn with_parts(
        config: &Config,
        fetcher: Box<dyn Fetch>,
        sinks: Vec<Box<dyn Sink>>,
    ) -> Result<Self> {
        let extractor = Extractor::new(config)?;
        Ok(Self::assemble(config, extractor, fetcher, sinks))
    }

    fn assemble(
        config: &Config,
        extractor: Extractor,
        fetcher: Box<dyn Fetch>,
        sinks: Vec<Box<dyn Sink>>,
    ) -> Self {
        let dedupe = Dedupe::new(extractor.specs());

        let mut scheduler = Scheduler::new(config.request.retry.max_attempts);
        scheduler.seed(&config.entrypoints);

        Self {
            scheduler,
            extractor,
            dedupe,
            fetcher,
            sinks,
            summary: RunSummary::new(&config.name),
        }
    }

    /// Records the config hash in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.summary.config_hash = Some(hash.into());
        self
    }

    /// Runs the crawl loop until the frontier is empty
    pub async fn run(mut self) -> Result<RunSummary> {
        tracing::info!(
            "Starting crawl of {} with {} URLs queued",
            self.summary.name,
            self.scheduler.len()
        );

        let mut processed: u64 = 0;

        while self.scheduler.has_next() {
            let request = self.scheduler.next()?;
            self.process_request(request).await;

            processed += 1;
            if processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} requests processed, {} queued, {} items emitted",
                    processed,
                    self.scheduler.len(),
                    self.summary.items_emitted
                );
            }
        }

        tracing::info!("Frontier is empty, crawl complete");

        for sink in &mut self.sinks {
            if let Err(e) = sink.finish() {
                self.summary.sink_errors += 1;
                tracing::warn!(
                    stage = "emit",
                    kind = e.kind(),
                    "{} sink failed to finish: {}",
                    sink.name(),
                    e
                );
            }
        }

        self.summary.finish();
        tracing::info!("{}", self.summary.summary_line());

        Ok(self.summary)
    }

    /// Fetches one request and routes the outcome
    async fn process_request(&mut self, request: Request) {
        tracing::debug!(
            stage = "fetch",
            url = %request.url,
            attempts = request.attempts,
            "Fetching"
        );

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.summary.requests_succeeded += 1;
                if response.status >= 400 {
                    tracing::warn!(
                        stage = "fetch",
                        url = %response.url,
                        "HTTP {} response, extracting anyway",
                        response.status
                    );
                }
                self.handle_response(&response);
            }
            Err(e) => {
                self.summary.requests_errored += 1;
                if let DeferOutcome::Dropped { .. } = self.scheduler.defer(request, &e) {
                    self.summary.requests_dropped += 1;
                }
            }
        }
    }

    /// Extracts a response and feeds its items and links onward
    fn handle_response(&mut self, response: &Response) {
        let Extraction { links, items } = self.extractor.parse(response);

        self.summary.items_parsed += items.len() as u64;
        tracing::debug!(
            stage = "extract",
            url = %response.url,
            "{} items, {} links",
            items.len(),
            links.len()
        );

        for item in items {
            self.handle_item(item, &response.url);
        }

        let added = self.scheduler.enqueue(links);
        if added > 0 {
            tracing::debug!(stage = "extract", url = %response.url, "Queued {} new URLs", added);
        }
    }

    /// Normalizes, deduplicates and emits one item
    fn handle_item(&mut self, item: Item, url: &str) {
        let Some(spec) = self.extractor.spec(&item.type_tag) else {
            return;
        };

        let item = match normalize::run(item, spec) {
            Ok(item) => item,
            Err(e) => {
                self.summary.normalize_errors += 1;
                tracing::warn!(
                    stage = "normalize",
                    url = %url,
                    kind = e.kind(),
                    "Dropping {} item: {}",
                    spec.name,
                    e
                );
                return;
            }
        };

        if self.dedupe.is_duplicate(&item) {
            self.summary.items_duplicate += 1;
            tracing::trace!(stage = "dedupe", url = %url, "Duplicate {} item", item.type_tag);
            return;
        }

        let record = item.into_record();
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(&record) {
                self.summary.sink_errors += 1;
                tracing::warn!(
                    stage = "emit",
                    url = %url,
                    kind = e.kind(),
                    "{} sink failed: {}",
                    sink.name(),
                    e
                );
            }
        }
        self.summary.items_emitted += 1;
    }
}

/// Runs a complete crawl for one config
///
/// # Arguments
///
/// * `config` - The site configuration
/// * `dry_run` - Crawl without writing any records
pub async fn run_crawl(config: &Config, dry_run: bool) -> Result<RunSummary> {
    Coordinator::new(config, dry_run)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::FetchError;
    use crate::item::{Record, Value};
    use crate::output::SinkResult;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Serves canned pages; URLs without a page fail with a connect error
    struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, request: &Request) -> std::result::Result<Response, FetchError> {
            self.calls.lock().unwrap().push(request.url.clone());
            match self.pages.get(&request.url) {
                Some(text) => Ok(Response {
                    url: request.url.clone(),
                    status: 200,
                    headers: HeaderMap::new(),
                    text: text.clone(),
                    elapsed: Duration::ZERO,
                }),
                None => Err(FetchError::Connect {
                    url: request.url.clone(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    /// Collects emitted records in memory
    struct MemorySink {
        records: Arc<Mutex<Vec<Record>>>,
    }

    impl Sink for MemorySink {
        fn name(&self) -> &str {
            "memory"
        }

        fn emit(&mut self, record: &Record) -> SinkResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    const CONFIG: &str = r#"
name = "quotes"
base-url = "http://site"

[[entrypoints]]
url-template = "http://site/page/{{page}}"
range = { start = 1, stop = 3 }

[request.retry]
max-attempts = 2

[items.Quote]
list-selector = "div.quote"
dedupe-keys = ["text"]

[items.Quote.fields.text]
candidates = [{ css = "div.quote span.text::text" }]
normalize = ["trim"]

[items.Quote.fields.year]
candidates = [{ css = "span.year::text" }]
normalize = ["to_datetime:%Y-%m-%d"]

[[links]]
css = "a.next"
"#;

    fn page(quotes: &[(&str, &str)], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for (text, year) in quotes {
            html.push_str(&format!(
                concat!(
                    r#"<div class="quote"><span class="text"> {} </span>"#,
                    r#"<span class="year">{}</span></div>"#,
                ),
                text,
                year
            ));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="next" href="{}">next</a>"#, next));
        }
        html.push_str("</body></html>");
        html
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let config = parse_config(CONFIG, false).unwrap();

        let mut pages = HashMap::new();
        pages.insert(
            "http://site/page/1".to_string(),
            page(&[("one", "2001-01-01"), ("two", "2002-01-01")], Some("/page/3")),
        );
        // page 2 is missing and fails on every attempt
        pages.insert(
            "http://site/page/3".to_string(),
            page(&[("two", "2002-01-01"), ("bad", "soon")], None),
        );

        let calls = Arc::new(Mutex::new(Vec::new()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let fetcher = FakeFetcher {
            pages,
            calls: Arc::clone(&calls),
        };
        let sink = MemorySink {
            records: Arc::clone(&records),
        };

        let summary = Coordinator::with_parts(&config, Box::new(fetcher), vec![Box::new(sink)])
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "http://site/page/1",
                "http://site/page/2",
                "http://site/page/3",
                "http://site/page/2",
            ]
        );

        assert_eq!(summary.requests_succeeded, 2);
        assert_eq!(summary.requests_errored, 2);
        assert_eq!(summary.requests_dropped, 1);
        assert_eq!(summary.items_parsed, 4);
        assert_eq!(summary.items_duplicate, 1);
        assert_eq!(summary.normalize_errors, 1);
        assert_eq!(summary.items_emitted, 2);
        assert_eq!(
            summary.summary_line(),
            "parsed 4 items, emitted 2, successes=2, errors=2"
        );

        let records = records.lock().unwrap();
        let texts: Vec<&Value> = records.iter().map(|r| r.get("text").unwrap()).collect();
        assert_eq!(texts, vec![&Value::from("one"), &Value::from("two")]);
        assert_eq!(
            records[0].keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["text", "year"]
        );
    }

    #[tokio::test]
    async fn test_bad_item_spec_fails_before_fetch() {
        let config = parse_config(
            r#"
name = "broken"
base-url = "http://site"

[[entrypoints]]
url = "http://site/"

[items.Thing.fields.x]
from = "request.body"
"#,
            false,
        )
        .unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let fetcher = FakeFetcher {
            pages: HashMap::new(),
            calls: Arc::clone(&calls),
        };

        let result = Coordinator::with_parts(&config, Box::new(fetcher), Vec::new());
        assert!(matches!(result, Err(crate::ScribeError::Config(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    fn sqlite_config(db_path: &std::path::Path, field_source: &str) -> Config {
        parse_config(
            &format!(
                r#"
name = "sqlite"
base-url = "http://site"

[[entrypoints]]
url = "http://site/"

[items.Thing.fields.x]
from = "{}"

[[pipelines]]
type = "sqlite"
path = "{}"
"#,
                field_source,
                db_path.display()
            ),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_bad_item_spec_opens_no_sink() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("out").join("items.db");
        let config = sqlite_config(&db_path, "request.body");

        let result = Coordinator::new(&config, false);
        assert!(matches!(result, Err(crate::ScribeError::Config(_))));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_unopenable_sink_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let config = sqlite_config(&blocker.join("items.db"), "response.url");

        let result = Coordinator::new(&config, false);
        assert!(matches!(result, Err(crate::ScribeError::Sink(_))));

        assert!(Coordinator::new(&config, true).is_ok());
    }
}
