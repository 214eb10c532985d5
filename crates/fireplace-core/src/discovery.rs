use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::models::{Concept, ConceptFailure, DiscoveryReport, Resource, ResourceType};
use crate::traits::{Crawler, LinkExtractor};

/// Hosts whose links are reported as [`ResourceType::Video`].
const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
];

/// Tuning knobs for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum number of concepts crawled at the same time.
    pub max_parallel: usize,

    /// Maximum number of resources kept per concept after deduplication.
    pub max_resources_per_concept: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            max_resources_per_concept: 10,
        }
    }
}

/// Fans concepts out to a crawler and link extractor and assembles the
/// results into [`Resource`] records.
///
/// Generic over the crawler and extractor so tests can run without network
/// access. A failure for one concept is recorded in the report and does not
/// stop the others.
#[derive(Clone)]
pub struct DiscoveryService<C, L>
where
    C: Crawler,
    L: LinkExtractor,
{
    crawler: C,
    extractor: L,
    config: DiscoveryConfig,
}

impl<C, L> DiscoveryService<C, L>
where
    C: Crawler,
    L: LinkExtractor,
{
    pub fn new(crawler: C, extractor: L) -> Self {
        Self {
            crawler,
            extractor,
            config: DiscoveryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Crawl every concept and collect the links found for each.
    ///
    /// Resources come back grouped by concept, in input order, regardless
    /// of which crawl finished first.
    pub async fn find_resources(
        &self,
        cancel: &CancellationToken,
        concepts: &[Concept],
    ) -> Result<DiscoveryReport, AppError> {
        if concepts.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one concept is required to discover resources".into(),
            ));
        }

        tracing::info!(
            concepts = concepts.len(),
            max_parallel = self.config.max_parallel,
            "Starting resource discovery"
        );

        let outcomes: Vec<Result<Vec<Resource>, AppError>> = stream::iter(concepts)
            .map(|concept| self.discover_concept(cancel, concept))
            .buffered(self.config.max_parallel.max(1))
            .collect()
            .await;

        let mut report = DiscoveryReport::default();
        for (concept, outcome) in concepts.iter().zip(outcomes) {
            match outcome {
                Ok(resources) => {
                    tracing::info!(
                        term = %concept.description,
                        resources = resources.len(),
                        "Concept discovered"
                    );
                    report.succeeded.push(concept.description.clone());
                    report.resources.extend(resources);
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        term = %concept.description,
                        error = %e,
                        "Concept discovery failed"
                    );
                    report.failed.push(ConceptFailure {
                        term: concept.description.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.succeeded.is_empty() {
            return Err(AppError::DiscoveryFailed {
                failures: report.failed,
            });
        }

        Ok(report)
    }

    async fn discover_concept(
        &self,
        cancel: &CancellationToken,
        concept: &Concept,
    ) -> Result<Vec<Resource>, AppError> {
        let term = concept.description.trim();
        if term.is_empty() {
            return Err(AppError::InvalidInput("concept has an empty description".into()));
        }

        let page = self.crawler.fetch(cancel, term).await?;
        tracing::debug!(url = %page.url, bytes = page.body.len(), "Fetched search page");

        // Relative hrefs belong to the page that actually served them.
        let links = self.extractor.extract_links(&page.body)?;
        Ok(self.links_to_resources(term, &page.url, &links))
    }

    fn links_to_resources(&self, term: &str, page_url: &Url, links: &[String]) -> Vec<Resource> {
        let mut seen = HashSet::new();
        let mut resources = Vec::new();

        for href in links {
            if resources.len() >= self.config.max_resources_per_concept {
                break;
            }
            let Some(url) = absolute_link(page_url, href) else {
                continue;
            };
            if !seen.insert(url.as_str().to_string()) {
                continue;
            }
            let source = url.host_str().unwrap_or_default().to_string();
            resources.push(Resource {
                title: term.to_string(),
                url: url.to_string(),
                source,
                resource_type: classify(&url),
                description: format!("Result for \"{term}\""),
            });
        }

        resources
    }
}

/// Resolve an href against the page it was found on.
///
/// Returns `None` for fragments, non-web schemes and unparseable values.
fn absolute_link(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = page_url.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

/// Classify a link as a video when its host is a known video platform.
pub fn classify(url: &Url) -> ResourceType {
    let Some(host) = url.host_str() else {
        return ResourceType::Website;
    };
    let host = host.to_ascii_lowercase();
    let is_video = VIDEO_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")));
    if is_video {
        ResourceType::Video
    } else {
        ResourceType::Website
    }
}
