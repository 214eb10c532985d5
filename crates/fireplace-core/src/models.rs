use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A discovery query unit derived from one parsed search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub description: String,
    /// Unset (0.0) unless something scores it externally.
    pub relevance: f32,
}

impl Concept {
    /// Build a concept from a single search term.
    pub fn from_term(term: &str) -> Self {
        Self {
            name: term.to_string(),
            description: term.to_string(),
            relevance: 0.0,
        }
    }
}

/// Kind of external link a [`Resource`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Video,
    Website,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Video => "video",
            ResourceType::Website => "website",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One external link discovered for a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub description: String,
}

/// A crawled page and the URL it was finally served from, after redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: Url,
    pub body: Vec<u8>,
}

/// A concept whose crawl or parse failed during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptFailure {
    pub term: String,
    pub error: String,
}

/// Outcome of one discovery run.
///
/// `failed` is non-empty when some (but not all) concepts failed; a run where
/// every concept fails is reported as [`AppError::DiscoveryFailed`] instead.
///
/// [`AppError::DiscoveryFailed`]: crate::error::AppError::DiscoveryFailed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub resources: Vec<Resource>,
    /// Terms that were crawled and parsed successfully, in input order.
    pub succeeded: Vec<String>,
    pub failed: Vec<ConceptFailure>,
}

impl DiscoveryReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Whether a checklist item recurs daily or is a one-off milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Daily,
    Longterm,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Daily => "daily",
            Scope::Longterm => "longterm",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Scope::Daily),
            "longterm" => Ok(Scope::Longterm),
            other => Err(format!("Invalid checklist scope: {other}")),
        }
    }
}

/// A task on a plan's checklist, as seen by prompt composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub scope: Scope,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl ChecklistItem {
    pub fn new(scope: Scope, description: impl Into<String>) -> Self {
        Self {
            scope,
            description: description.into(),
            scheduled_time: None,
        }
    }
}

/// Optional filters for checklist lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecklistFilter {
    pub scope: Option<Scope>,
    /// `Some(true)` keeps items scheduled in the future, `Some(false)` keeps
    /// unscheduled or past items.
    pub upcoming: Option<bool>,
}

impl ChecklistFilter {
    pub fn scope(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            upcoming: None,
        }
    }

    /// Returns true if `item` passes the filter at time `now`.
    pub fn matches(&self, item: &ChecklistItem, now: DateTime<Utc>) -> bool {
        if let Some(scope) = self.scope {
            if item.scope != scope {
                return false;
            }
        }
        match self.upcoming {
            None => true,
            Some(upcoming) => {
                let is_upcoming = item.scheduled_time.is_some_and(|t| t > now);
                is_upcoming == upcoming
            }
        }
    }
}

/// The free-text description of what a plan is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFocus {
    pub focus: String,
}
