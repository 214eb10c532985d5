use std::net::IpAddr;
use std::time::Duration;

use fireplace_core::error::AppError;
use fireplace_core::models::FetchedPage;
use fireplace_core::traits::Crawler;
use reqwest::Client;
use reqwest::header::{HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Desktop browser User-Agent; search sites block obvious bots.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_REDIRECTS: usize = 3;

/// Search-page crawler using reqwest.
///
/// Every path is resolved against a base URL parsed once at construction,
/// then fetched with a single GET. By default, SSRF protection is
/// **enabled**: requests to private/reserved IP ranges are blocked, both for
/// the first request and for every redirect hop. Use
/// [`allow_private_urls`](Self::allow_private_urls) to disable this (e.g.,
/// for local development against a mock site).
#[derive(Clone)]
pub struct ReqwestCrawler {
    client: Client,
    base_url: Url,
    timeout: Duration,
    max_redirects: usize,
    ssrf_protection: bool,
    is_blocked: fn(IpAddr) -> bool,
}

impl ReqwestCrawler {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid base URL '{base_url}': {e}")))?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::InvalidInput(format!(
                    "Base URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }
        Self::build(base_url, DEFAULT_TIMEOUT, DEFAULT_MAX_REDIRECTS, true)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(self.base_url, timeout, self.max_redirects, self.ssrf_protection)
    }

    pub fn with_max_redirects(self, max_redirects: usize) -> Result<Self, AppError> {
        Self::build(self.base_url, self.timeout, max_redirects, self.ssrf_protection)
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    ///
    /// Only use this for local development and tests.
    pub fn allow_private_urls(self) -> Result<Self, AppError> {
        Self::build(self.base_url, self.timeout, self.max_redirects, false)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build(
        base_url: Url,
        timeout: Duration,
        max_redirects: usize,
        ssrf_protection: bool,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
            max_redirects,
            ssrf_protection,
            is_blocked: is_private_ip,
        })
    }

    /// GET `url`, following up to `max_redirects` redirects by hand.
    ///
    /// Every hop, including each redirect target, goes through the address
    /// check when SSRF protection is on.
    async fn fetch_url(&self, url: &Url) -> Result<FetchedPage, AppError> {
        let mut current = url.clone();
        let mut redirects = 0;

        loop {
            if self.ssrf_protection {
                validate_url(&current, self.is_blocked).await?;
            }

            tracing::info!(url = %current, "Crawling");
            let response = self
                .client
                .get(current.as_str())
                .send()
                .await
                .map_err(|e| self.transport_error(&current, &e))?;

            let status = response.status();
            if status.is_redirection()
                && let Some(location) = response.headers().get(LOCATION)
            {
                if redirects == self.max_redirects {
                    return Err(AppError::TooManyRedirects {
                        url: url.to_string(),
                        max: self.max_redirects,
                    });
                }
                redirects += 1;
                current = redirect_target(&current, location)?;
                tracing::debug!(target_url = %current, redirects, "Following redirect");
                continue;
            }

            if !status.is_success() {
                return Err(AppError::NonSuccessStatus {
                    status_code: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let body = response.bytes().await.map_err(|e| {
                AppError::Network(format!("Failed to read response body from {current}: {e}"))
            })?;

            tracing::debug!(url = %current, bytes = body.len(), "Fetched page");
            return Ok(FetchedPage {
                url: current,
                body: body.to_vec(),
            });
        }
    }

    fn transport_error(&self, url: &Url, e: &reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Network(format!(
                "Request to {url} timed out after {} seconds",
                self.timeout.as_secs()
            ))
        } else if e.is_connect() {
            AppError::Network(format!("Connection failed for {url}: {e}"))
        } else {
            AppError::Network(format!("Error fetching {url}: {e}"))
        }
    }
}

impl Crawler for ReqwestCrawler {
    /// Spaces become `%20` before the path is appended to the base URL's
    /// string form; the result is then resolved against the base URL.
    fn resolve_path(&self, path: &str) -> Result<Url, AppError> {
        let joined = format!("{}{}", self.base_url.as_str(), path.replace(' ', "%20"));
        self.base_url.join(&joined).map_err(|e| {
            AppError::InvalidInput(format!(
                "Cannot resolve '{path}' against {}: {e}",
                self.base_url
            ))
        })
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<FetchedPage, AppError> {
        let url = self.resolve_path(path)?;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let crawl = tokio::time::timeout(self.timeout, self.fetch_url(&url));
        tokio::select! {
            result = crawl => result.unwrap_or_else(|_| {
                Err(AppError::Network(format!(
                    "Crawl of {url} timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }),
            () = cancel.cancelled() => {
                tracing::debug!(url = %url, "Crawl cancelled");
                Err(AppError::Cancelled)
            }
        }
    }
}

/// Resolve a `Location` header against the URL that sent it.
fn redirect_target(from: &Url, location: &HeaderValue) -> Result<Url, AppError> {
    let location = location.to_str().map_err(|_| {
        AppError::Network(format!("Redirect from {from} has an unreadable Location"))
    })?;
    let target = from.join(location).map_err(|e| {
        AppError::Network(format!("Redirect from {from} to '{location}' is invalid: {e}"))
    })?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(AppError::Network(format!(
            "Refusing redirect from {from} to non-web URL {target}"
        )));
    }
    Ok(target)
}

/// Refuse to crawl URLs that point into the local network.
///
/// Hostnames are resolved first and every returned address is checked, so a
/// public name pointing at a private address is rejected as well.
async fn validate_url(url: &Url, is_blocked: fn(IpAddr) -> bool) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(format!(
            "Refusing to crawl '{}' URL (only http/https)",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::InvalidInput(format!("Crawl URL {url} has no host")))?;
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');

    let addresses: Vec<IpAddr> = match bare_host.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((bare_host, port))
                .await
                .map_err(|e| AppError::Network(format!("Cannot resolve {host}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    if addresses.is_empty() {
        return Err(AppError::Network(format!("{host} resolved to no addresses")));
    }

    if let Some(blocked) = addresses.into_iter().find(|ip| is_blocked(*ip)) {
        return Err(AppError::Network(format!(
            "SSRF blocked: {host} points at reserved address {blocked}"
        )));
    }

    Ok(())
}

/// Loopback, private, link-local, CGN and other non-routable ranges.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [first, second, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (first == 100 && (second & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (head & 0xFFC0) == 0xFE80
                || (head & 0xFE00) == 0xFC00
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
