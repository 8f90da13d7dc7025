//! Scheduler for managing the crawl frontier
//!
//! This module handles:
//! - Seeding the frontier from entry points (literal URLs and page templates)
//! - Strict FIFO ordering of pending requests
//! - URL deduplication across the pending and visited sets
//! - The retry policy for failed fetches

use crate::config::{EntryPoint, PageRange, PAGE_TOKEN};
use crate::crawler::FetchError;
use crate::{Result, ScribeError};
use indexmap::IndexMap;
use reqwest::Method;
use std::collections::{HashSet, VecDeque};

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The URL to fetch
    pub url: String,

    /// HTTP method (always GET for seeded and discovered requests)
    pub method: Method,

    /// Free-form request metadata
    pub meta: IndexMap<String, serde_json::Value>,

    /// Failed attempts so far; only the scheduler increments this
    pub attempts: u32,
}

impl Request {
    /// Creates a zero-attempt GET request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            meta: IndexMap::new(),
            attempts: 0,
        }
    }
}

/// What [`Scheduler::defer`] did with a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferOutcome {
    /// Re-queued at the tail with the new attempt count
    Requeued { attempts: u32 },

    /// Attempts exhausted; the URL stays visited
    Dropped { attempts: u32 },
}

/// Scheduler manages the frontier queue and the retry policy
///
/// A URL is in at most one of `pending` (currently queued) and `visited`
/// (dequeued and not re-queued for retry).
#[derive(Debug)]
pub struct Scheduler {
    /// FIFO of requests waiting to be fetched
    queue: VecDeque<Request>,

    /// URLs currently in the queue
    pending: HashSet<String>,

    /// URLs dequeued at least once and not currently re-queued
    visited: HashSet<String>,

    /// Attempts allowed per URL before it is dropped
    max_attempts: u32,
}

impl Scheduler {
    /// Creates an empty scheduler
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Attempts allowed per URL (values below 1 count as 1)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            pending: HashSet::new(),
            visited: HashSet::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Seeds the frontier from entry points
    ///
    /// Entry points are expanded in order; templates walk their page range.
    /// URLs already pending or visited are skipped.
    pub fn seed(&mut self, entrypoints: &[EntryPoint]) {
        for entry in entrypoints {
            let added = self.enqueue(expand_entrypoint(entry));
            tracing::debug!("Seeded {} URLs from {:?}", added, entry);
        }
    }

    /// Returns true if there are queued requests
    pub fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Pops the head of the queue and marks its URL visited
    ///
    /// # Errors
    ///
    /// `ScribeError::EmptyFrontier` when nothing is queued.
    pub fn next(&mut self) -> Result<Request> {
        let request = self.queue.pop_front().ok_or(ScribeError::EmptyFrontier)?;
        self.pending.remove(&request.url);
        self.visited.insert(request.url.clone());
        Ok(request)
    }

    /// Appends zero-attempt requests for URLs neither pending nor visited
    ///
    /// Returns how many URLs were actually queued.
    pub fn enqueue<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;

        for url in urls {
            let url = url.into();
            if self.visited.contains(&url) || self.pending.contains(&url) {
                continue;
            }
            self.pending.insert(url.clone());
            self.queue.push_back(Request::new(url));
            added += 1;
        }

        added
    }

    /// Applies the retry policy to a request whose fetch failed
    ///
    /// The request is dropped once `attempts + 1` reaches `max_attempts`;
    /// otherwise its attempt count is incremented and it goes back to the tail
    /// of the queue. A dropped URL stays visited.
    pub fn defer(&mut self, mut request: Request, error: &FetchError) -> DeferOutcome {
        let attempts = request.attempts + 1;

        if attempts >= self.max_attempts {
            tracing::warn!(
                stage = "fetch",
                url = %request.url,
                kind = error.kind(),
                "Dropped after {} attempts: {}",
                attempts,
                error
            );
            return DeferOutcome::Dropped { attempts };
        }

        tracing::debug!(
            stage = "fetch",
            url = %request.url,
            kind = error.kind(),
            "Re-queued (attempt {}): {}",
            attempts,
            error
        );

        request.attempts = attempts;
        self.visited.remove(&request.url);
        self.pending.insert(request.url.clone());
        self.queue.push_back(request);

        DeferOutcome::Requeued { attempts }
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of URLs dequeued so far and not re-queued
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Queued URLs in fetch order
    pub fn queued_urls(&self) -> Vec<&str> {
        self.queue.iter().map(|request| request.url.as_str()).collect()
    }
}

/// Expands an entry point into the URLs it names, in order
pub fn expand_entrypoint(entry: &EntryPoint) -> Vec<String> {
    match entry {
        EntryPoint::Url { url } => vec![url.clone()],
        EntryPoint::Template {
            url_template,
            range,
        } => page_numbers(range)
            .map(|page| url_template.replace(PAGE_TOKEN, &page.to_string()))
            .collect(),
    }
}

/// Half-open `start..stop` walked by `step`; a negative step counts down
fn page_numbers(range: &PageRange) -> impl Iterator<Item = i64> {
    let PageRange { start, stop, step } = *range;

    let mut current = start;
    std::iter::from_fn(move || {
        let in_range = match step {
            s if s > 0 => current < stop,
            s if s < 0 => current > stop,
            _ => false,
        };
        if !in_range {
            return None;
        }
        let page = current;
        current = current.checked_add(step)?;
        Some(page)
    })
}
