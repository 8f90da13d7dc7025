//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! pipeline end-to-end: fetch, extract, normalize, dedupe and emit.

use std::fs;
use std::path::Path;
use sumi_scribe::config::{load_config, parse_config, Config};
use sumi_scribe::crawler::Coordinator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quote_page(quotes: &[(&str, &str, &[&str])], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><div class=\"col-md-8\">");
    for (text, author, tags) in quotes {
        html.push_str(&format!(
            r#"<div class="quote">
                <span class="text">{}</span>
                <span>by <small class="author">{}</small></span>
                <div class="tags">{}</div>
            </div>"#,
            text,
            author,
            tags.iter()
                .map(|tag| format!(r#"<a class="tag" href="/tag/{0}/">{0}</a>"#, tag))
                .collect::<String>()
        ));
    }
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<nav><ul class="pager"><li class="next"><a href="{}">Next</a></li></ul></nav>"#,
            next
        ));
    }
    html.push_str("</div></body></html>");
    html
}

/// Creates a quotes config against the mock server writing to the given sinks
fn quotes_config(base_url: &str, pipelines: &str) -> Config {
    let toml = format!(
        r#"
name = "quotes"
base-url = "{base}"

[[entrypoints]]
url = "{base}/page/1/"

[request]
timeout-s = 5

[request.retry]
max-attempts = 2

[items.Quote]
list-selector = "div.quote"
dedupe-keys = ["text"]

[items.Quote.fields.text]
candidates = [{{ css = "div.quote span.text::text" }}]
normalize = ["trim"]

[items.Quote.fields.author]
candidates = [{{ css = "small.author::text" }}, {{ css = "span.author::text" }}]
normalize = ["trim", "lower"]

[items.Quote.fields.tags]
candidates = [{{ css = "a.tag::text", as = "list" }}]
normalize = ["join:|"]

[[links]]
css = "li.next a"

{pipelines}
"#,
        base = base_url,
        pipelines = pipelines
    );
    parse_config(&toml, false).expect("config should parse")
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_quotes_site(server: &MockServer) {
    mount_page(
        server,
        "/page/1/",
        quote_page(
            &[
                ("  “Quote one.”  ", "Albert Einstein", &["change", "world"]),
                ("“Quote two.”", "J.K. Rowling", &["choices"]),
            ],
            Some("/page/2/"),
        ),
    )
    .await;

    mount_page(
        server,
        "/page/2/",
        quote_page(
            &[
                ("“Quote two.”", "J.K. Rowling", &["choices"]),
                ("“Quote three.”", "Jane Austen", &[]),
            ],
            None,
        ),
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_to_csv() {
    let mock_server = MockServer::start().await;
    mount_quotes_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("out").join("quotes.csv");
    let config = quotes_config(
        &mock_server.uri(),
        &format!(
            "[[pipelines]]\ntype = \"csv\"\npath = \"{}\"\n",
            csv_path.display()
        ),
    );

    let summary = Coordinator::new(&config, false)
        .expect("coordinator")
        .run()
        .await
        .expect("crawl");

    assert_eq!(summary.requests_succeeded, 2);
    assert_eq!(summary.requests_errored, 0);
    assert_eq!(summary.items_parsed, 4);
    assert_eq!(summary.items_duplicate, 1);
    assert_eq!(summary.items_emitted, 3);
    assert_eq!(
        summary.summary_line(),
        "parsed 4 items, emitted 3, successes=2, errors=0"
    );

    let content = fs::read_to_string(&csv_path).expect("csv written");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "text,author,tags",
            "“Quote one.”,albert einstein,change|world",
            "“Quote two.”,j.k. rowling,choices",
            "“Quote three.”,jane austen,",
        ]
    );
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let mock_server = MockServer::start().await;
    mount_quotes_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("quotes.csv");
    let config = quotes_config(
        &mock_server.uri(),
        &format!(
            "[[pipelines]]\ntype = \"csv\"\npath = \"{}\"\n",
            csv_path.display()
        ),
    );

    let summary = Coordinator::new(&config, true)
        .expect("coordinator")
        .run()
        .await
        .expect("crawl");

    assert_eq!(summary.items_emitted, 3);
    assert!(!csv_path.exists());
}

#[tokio::test]
async fn test_sqlite_upsert_across_runs() {
    let mock_server = MockServer::start().await;
    mount_quotes_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("quotes.db");
    let pipelines = format!(
        concat!(
            "[[pipelines]]\ntype = \"sqlite\"\ndsn = \"sqlite:///{}\"\n",
            "table = \"quotes\"\nupsert-keys = [\"text\"]\n",
        ),
        db_path.display()
    );
    let config = quotes_config(&mock_server.uri(), &pipelines);

    for _ in 0..2 {
        Coordinator::new(&config, false)
            .expect("coordinator")
            .run()
            .await
            .expect("crawl");
    }

    let conn = rusqlite::Connection::open(&db_path).expect("open db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_server_errors_are_responses_and_unreachable_urls_retry() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        concat!(
            r#"<a class="next" href="/broken">x</a>"#,
            r#"<a class="next" href="http://127.0.0.1:1/down">y</a>"#,
        )
        .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<h1>oops</h1>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = parse_config(
        &format!(
            r#"
name = "errors"
base-url = "{base}"

[[entrypoints]]
url = "{base}/"

[request]
timeout-s = 5

[request.retry]
max-attempts = 3

[items.Page.fields.url]
from = "response.url"

[items.Page.fields.status]
from = "response.status"

[[links]]
css = "a.next"
"#,
            base = mock_server.uri()
        ),
        false,
    )
    .expect("config should parse");

    let summary = Coordinator::new(&config, true)
        .expect("coordinator")
        .run()
        .await
        .expect("crawl");

    // "/" and "/broken" are responses; the unreachable URL fails 3 times
    assert_eq!(summary.requests_succeeded, 2);
    assert_eq!(summary.requests_errored, 3);
    assert_eq!(summary.requests_dropped, 1);
    assert_eq!(summary.items_parsed, 2);
}

#[tokio::test]
async fn test_crawl_local_files_from_json_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let site = dir.path().join("site");
    fs::create_dir_all(&site).expect("site dir");
    fs::write(
        site.join("index.html"),
        concat!(
            r#"<h1 class="title"> Heat </h1><script>var year = "1995";</script>"#,
            r#"<a href="second.html">2</a>"#,
        ),
    )
    .expect("write index");
    fs::write(
        site.join("second.html"),
        r#"<h1 class="title">Ronin</h1><script>var year = "1998";</script>"#,
    )
    .expect("write second");

    let index_url = url::Url::from_file_path(site.join("index.html")).expect("file url");
    let csv_path = dir.path().join("movies.csv");

    let json = serde_json::json!({
        "name": "local",
        "base_url": index_url.as_str(),
        "entrypoints": [{ "url": index_url.as_str() }],
        "items": {
            "Movie": {
                "dedupe_keys": ["title"],
                "fields": {
                    "title": { "candidates": [{ "css": "h1.title::text" }] },
                    "year": {
                        "candidates": [{ "regex": "year = \"(\\d+)\"" }],
                        "normalize": ["to_int"]
                    }
                }
            }
        },
        "links": [{ "css": "a" }],
        "pipelines": [{ "type": "csv", "path": csv_path.display().to_string() }]
    });
    let config_path = dir.path().join("local.json");
    fs::write(&config_path, json.to_string()).expect("write config");

    let config = load_config(Path::new(&config_path)).expect("json config loads");
    let summary = Coordinator::new(&config, false)
        .expect("coordinator")
        .run()
        .await
        .expect("crawl");

    assert_eq!(summary.requests_succeeded, 2);
    assert_eq!(summary.items_emitted, 2);

    let content = fs::read_to_string(&csv_path).expect("csv written");
    assert_eq!(content, "title,year\nHeat,1995\nRonin,1998\n");
}
