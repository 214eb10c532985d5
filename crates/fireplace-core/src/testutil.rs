//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::models::FetchedPage;
use crate::traits::{Crawler, Generator, LinkExtractor};

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Response returned by [`MockGenerator`] once its queue is drained.
pub const DEFAULT_GENERATION: &str = "Write integration tests for the HTTP handlers";

/// Mock generator that returns queued responses and records every prompt.
#[derive(Clone)]
pub struct MockGenerator {
    /// Queue of responses. Each call pops the first element.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new(text: &str) -> Self {
        Self::with_responses(vec![Ok(text.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience for a queue of successful responses.
    pub fn with_texts(texts: &[&str]) -> Self {
        Self::with_responses(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Generator for MockGenerator {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        message: &str,
    ) -> Result<String, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.prompts.lock().unwrap().push(message.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(DEFAULT_GENERATION.to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCrawler
// ---------------------------------------------------------------------------

/// Mock crawler serving canned bodies keyed by search path.
///
/// Paths without a canned response answer with HTTP 404. An optional delay
/// keeps each fetch in flight for a while so tests can observe how many
/// run at once.
#[derive(Clone)]
pub struct MockCrawler {
    base: String,
    pages: Arc<Mutex<HashMap<String, Result<FetchedPage, AppError>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    in_flight: Arc<Mutex<InFlight>>,
}

#[derive(Default)]
struct InFlight {
    current: usize,
    peak: usize,
}

impl MockCrawler {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            pages: Arc::new(Mutex::new(HashMap::new())),
            fetched: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
        }
    }

    pub fn with_page(self, path: &str, body: &str) -> Self {
        let url = self.resolve_path(path).unwrap();
        let page = FetchedPage {
            url,
            body: body.as_bytes().to_vec(),
        };
        self.insert(path, Ok(page))
    }

    /// Serve `body` as if the site redirected `path` to `final_url`.
    pub fn with_redirected_page(self, path: &str, final_url: &str, body: &str) -> Self {
        let url = Url::parse(final_url).unwrap();
        let page = FetchedPage {
            url,
            body: body.as_bytes().to_vec(),
        };
        self.insert(path, Ok(page))
    }

    pub fn with_error(self, path: &str, error: AppError) -> Self {
        self.insert(path, Err(error))
    }

    /// Hold every fetch for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn insert(self, path: &str, page: Result<FetchedPage, AppError>) -> Self {
        self.pages.lock().unwrap().insert(path.to_string(), page);
        self
    }

    /// Paths fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Highest number of fetches that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().peak
    }
}

impl Crawler for MockCrawler {
    fn resolve_path(&self, path: &str) -> Result<Url, AppError> {
        let joined = format!("{}{}", self.base, path.replace(' ', "%20"));
        Url::parse(&joined).map_err(|e| AppError::InvalidInput(format!("Invalid URL: {e}")))
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<FetchedPage, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.fetched.lock().unwrap().push(path.to_string());
        let url = self.resolve_path(path)?;

        if let Some(delay) = self.delay {
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                in_flight.current += 1;
                in_flight.peak = in_flight.peak.max(in_flight.current);
            }
            tokio::time::sleep(delay).await;
            self.in_flight.lock().unwrap().current -= 1;
        }

        self.pages.lock().unwrap().remove(path).unwrap_or_else(|| {
            Err(AppError::NonSuccessStatus {
                status_code: 404,
                url: url.to_string(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockLinkExtractor
// ---------------------------------------------------------------------------

/// Body that makes [`MockLinkExtractor`] fail with a parse error.
pub const PARSE_ERROR_MARKER: &str = "<<unparseable>>";

/// Mock extractor treating every non-blank line of the body as one link.
#[derive(Clone, Default)]
pub struct MockLinkExtractor;

impl MockLinkExtractor {
    pub fn lines() -> Self {
        Self
    }
}

impl LinkExtractor for MockLinkExtractor {
    fn extract_links(&self, document: &[u8]) -> Result<Vec<String>, AppError> {
        let text = std::str::from_utf8(document).map_err(|e| AppError::Parse(e.to_string()))?;
        if text.starts_with(PARSE_ERROR_MARKER) {
            return Err(AppError::Parse("mock document is unparseable".into()));
        }
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
