//! HTTP fetcher implementation
//!
//! This module handles all fetches for the crawler, including:
//! - Building HTTP clients with the configured user agent, headers and timeout
//! - GET requests to fetch page content, following redirects
//! - Reading `file://` URLs from disk
//! - Falling back to an unverified client on certificate errors when allowed
//! - Error classification

use crate::config::RequestConfig;
use crate::crawler::Request;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// A fetched page
///
/// Any HTTP status is a response; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code (200 for files)
    pub status: u16,

    /// Response headers (empty for files)
    pub headers: HeaderMap,

    /// Decoded body
    pub text: String,

    /// Time from request start to fully read body
    pub elapsed: Duration,
}

/// Transport-level fetch failures, recovered by the scheduler's retry policy
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("TLS error for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Short error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connect { .. } => "connect",
            Self::Tls { .. } => "tls",
            Self::File { .. } => "file",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Network { .. } => "network",
        }
    }
}

/// Something that turns requests into responses
///
/// The coordinator is generic over this seam so tests can script failures.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches one request
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Default user agent: `sumi-scribe/<version> (+<base_url>)`
pub fn default_user_agent(base_url: &str) -> String {
    format!("sumi-scribe/{} (+{})", env!("CARGO_PKG_VERSION"), base_url)
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Fetch options (timeout, user agent, extra headers)
/// * `base_url` - Site base URL, used in the default user agent
/// * `verify_certs` - Whether TLS certificates are verified
///
/// Header entries with an invalid name or value are skipped with a warning.
pub fn build_http_client(
    config: &RequestConfig,
    base_url: &str,
    verify_certs: bool,
) -> Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| default_user_agent(base_url));

    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid request header '{}'", name),
        }
    }

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(!verify_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,

    /// Unverified client, only built when `verify = false`
    insecure: Option<Client>,
}

impl HttpFetcher {
    /// Builds the fetcher for a site
    pub fn new(config: &RequestConfig, base_url: &str) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, base_url, true)?;
        let insecure = if config.verify {
            None
        } else {
            Some(build_http_client(config, base_url, false)?)
        };

        Ok(Self { client, insecure })
    }

    async fn send(client: &Client, request: &Request) -> Result<Response, reqwest::Error> {
        let started = Instant::now();

        let response = client
            .request(request.method.clone(), request.url.as_str())
            .send()
            .await?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await?;

        Ok(Response {
            url,
            status,
            headers,
            text,
            elapsed: started.elapsed(),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url =
            Url::parse(&request.url).map_err(|_| FetchError::InvalidUrl(request.url.clone()))?;

        if url.scheme() == "file" {
            return read_file(&url).await;
        }

        match Self::send(&self.client, request).await {
            Ok(response) => Ok(response),
            Err(e) if is_certificate_error(&e) => match &self.insecure {
                Some(insecure) => {
                    tracing::warn!(
                        stage = "fetch",
                        url = %request.url,
                        kind = "tls",
                        "Certificate verification failed; retrying without verification"
                    );
                    Self::send(insecure, request)
                        .await
                        .map_err(|e| classify_error(&request.url, &e))
                }
                None => Err(classify_error(&request.url, &e)),
            },
            Err(e) => Err(classify_error(&request.url, &e)),
        }
    }
}

/// Reads a `file://` URL into a 200 response
async fn read_file(url: &Url) -> Result<Response, FetchError> {
    let started = Instant::now();
    let path = url
        .to_file_path()
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|source| FetchError::File {
        path: path.display().to_string(),
        source,
    })?;

    Ok(Response {
        url: url.to_string(),
        status: 200,
        headers: HeaderMap::new(),
        text: String::from_utf8_lossy(&bytes).into_owned(),
        elapsed: started.elapsed(),
    })
}

/// Returns true if any error in the chain mentions a certificate
fn is_certificate_error(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(e) = source {
        if e.to_string().to_lowercase().contains("certificate") {
            return true;
        }
        source = e.source();
    }
    false
}

/// Maps a reqwest error onto a fetch error kind
fn classify_error(url: &str, error: &reqwest::Error) -> FetchError {
    let url = url.to_string();

    if error.is_timeout() {
        FetchError::Timeout { url }
    } else if is_certificate_error(error) {
        FetchError::Tls {
            url,
            message: error.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url,
            message: error.to_string(),
        }
    } else {
        FetchError::Network {
            url,
            message: error.to_string(),
        }
    }
}
