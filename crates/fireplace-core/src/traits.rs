use std::future::Future;

use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ChecklistFilter, ChecklistItem, FetchedPage, PlanFocus};

/// Produces text from an LLM for a single user message.
///
/// One implementation is configured per system prompt; callers that need
/// different personas hold several instances of the same type.
pub trait Generator: Send + Sync + Clone {
    fn generate(
        &self,
        cancel: &CancellationToken,
        message: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Fetches pages from a single search endpoint.
pub trait Crawler: Send + Sync + Clone {
    /// Resolve a search path against the crawler's base URL.
    fn resolve_path(&self, path: &str) -> Result<Url, AppError>;

    /// Fetch the resolved path. The returned page carries the raw body and
    /// the URL that served it, which differs from the resolved one when the
    /// site redirected.
    fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Pulls hyperlink targets out of an HTML document, in document order.
pub trait LinkExtractor: Send + Sync + Clone {
    fn extract_links(&self, document: &[u8]) -> Result<Vec<String>, AppError>;
}

/// Read access to plans and their checklists, owned by the persistence layer.
pub trait PlanStore: Send + Sync + Clone {
    fn plan_focus(&self, plan_id: Uuid) -> impl Future<Output = Result<PlanFocus, AppError>> + Send;

    /// Checklist items for a plan, in their stored order.
    fn checklist_items(
        &self,
        plan_id: Uuid,
        filter: ChecklistFilter,
    ) -> impl Future<Output = Result<Vec<ChecklistItem>, AppError>> + Send;
}
