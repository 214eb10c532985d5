pub mod discovery;
pub mod error;
pub mod insights;
pub mod models;
pub mod plan_store;
pub mod prompt;
pub mod retry;
pub mod search_terms;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use discovery::{DiscoveryConfig, DiscoveryService};
pub use error::AppError;
pub use insights::{InsightGenerators, InsightService};
pub use models::{
    ChecklistItem, Concept, DiscoveryReport, FetchedPage, Resource, ResourceType, Scope,
};
pub use plan_store::{InMemoryPlanStore, PlanRecord};
pub use retry::RetryPolicy;
pub use traits::{Crawler, Generator, LinkExtractor, PlanStore};
