use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::discovery::DiscoveryService;
use crate::error::AppError;
use crate::models::{ChecklistFilter, ChecklistItem, DiscoveryReport};
use crate::prompt::{self, SEARCH_TERM_COUNT, SUGGESTION_MAX_WORDS, SUGGESTION_MIN_WORDS};
use crate::search_terms;
use crate::traits::{Crawler, Generator, LinkExtractor, PlanStore};

/// Number of suggestions in a daily batch.
pub const DAILY_SUGGESTION_COUNT: usize = 3;

/// Extra requests allowed when the model returns an unusable or repeated task.
const MAX_REROLLS: usize = 2;

/// One generator per persona. All three share a type and differ only in the
/// system prompt they were built with.
#[derive(Clone)]
pub struct InsightGenerators<G: Generator> {
    pub checklist: G,
    pub daily_focus: G,
    pub search_terms: G,
}

/// Plan-level AI features: task suggestions, daily focus, and resource
/// discovery.
///
/// Stateless between calls; every method reads the plan through the
/// [`PlanStore`] and composes a fresh prompt.
pub struct InsightService<G, C, L, S>
where
    G: Generator,
    C: Crawler,
    L: LinkExtractor,
    S: PlanStore,
{
    generators: InsightGenerators<G>,
    discovery: DiscoveryService<C, L>,
    store: S,
}

impl<G, C, L, S> InsightService<G, C, L, S>
where
    G: Generator,
    C: Crawler,
    L: LinkExtractor,
    S: PlanStore,
{
    pub fn new(
        generators: InsightGenerators<G>,
        discovery: DiscoveryService<C, L>,
        store: S,
    ) -> Self {
        Self {
            generators,
            discovery,
            store,
        }
    }

    async fn load_plan(&self, plan_id: Uuid) -> Result<(String, Vec<ChecklistItem>), AppError> {
        let focus = self.store.plan_focus(plan_id).await?;
        let checklist = self
            .store
            .checklist_items(plan_id, ChecklistFilter::default())
            .await?;
        tracing::debug!(%plan_id, items = checklist.len(), "Loaded plan context");
        Ok((focus.focus, checklist))
    }

    /// One actionable task for the plan.
    pub async fn generate_suggestion(
        &self,
        cancel: &CancellationToken,
        plan_id: Uuid,
    ) -> Result<String, AppError> {
        let (focus, checklist) = self.load_plan(plan_id).await?;
        let prompt = prompt::compose_suggestion_prompt(&focus, &checklist, None);
        let suggestion = request_task(&self.generators.checklist, cancel, &prompt, &[]).await?;
        tracing::info!(%plan_id, %suggestion, "Generated suggestion");
        Ok(suggestion)
    }

    /// Three mutually distinct tasks for today.
    ///
    /// Requests are strictly sequential: each prompt excludes every
    /// suggestion already produced in the batch.
    pub async fn generate_daily_suggestions(
        &self,
        cancel: &CancellationToken,
        plan_id: Uuid,
    ) -> Result<Vec<String>, AppError> {
        let (focus, checklist) = self.load_plan(plan_id).await?;
        let mut suggestions: Vec<String> = Vec::with_capacity(DAILY_SUGGESTION_COUNT);

        for index in 0..DAILY_SUGGESTION_COUNT {
            let exclusion = prompt::exclusion_clause(&suggestions);
            let prompt =
                prompt::compose_suggestion_prompt(&focus, &checklist, exclusion.as_deref());
            let suggestion =
                request_task(&self.generators.daily_focus, cancel, &prompt, &suggestions).await?;
            tracing::debug!(%plan_id, index, %suggestion, "Generated daily suggestion");
            suggestions.push(suggestion);
        }

        tracing::info!(%plan_id, count = suggestions.len(), "Generated daily suggestions");
        Ok(suggestions)
    }

    /// Complete a partially typed checklist item.
    pub async fn autocomplete_suggestion(
        &self,
        cancel: &CancellationToken,
        plan_id: Uuid,
        partial: &str,
    ) -> Result<String, AppError> {
        if partial.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "text to autocomplete must not be empty".into(),
            ));
        }
        let (focus, checklist) = self.load_plan(plan_id).await?;
        let prompt = prompt::compose_autocomplete_prompt(&focus, &checklist, partial);
        request_task(&self.generators.checklist, cancel, &prompt, &[]).await
    }

    /// Search terms for the plan, as parsed from the model's answer.
    pub async fn generate_search_terms(
        &self,
        cancel: &CancellationToken,
        plan_id: Uuid,
    ) -> Result<Vec<String>, AppError> {
        let (focus, checklist) = self.load_plan(plan_id).await?;
        let prompt = prompt::compose_search_term_prompt(&focus, &checklist);
        let raw = self.generators.search_terms.generate(cancel, &prompt).await?;
        let terms = search_terms::parse(&raw);
        tracing::info!(%plan_id, terms = terms.len(), "Generated search terms");
        Ok(terms)
    }

    /// Focus → search terms → crawled resources.
    pub async fn generate_suggested_resources(
        &self,
        cancel: &CancellationToken,
        plan_id: Uuid,
    ) -> Result<DiscoveryReport, AppError> {
        let terms = self.generate_search_terms(cancel, plan_id).await?;
        let concepts = search_terms::to_concepts(&terms, SEARCH_TERM_COUNT, SEARCH_TERM_COUNT)?;
        let report = self.discovery.find_resources(cancel, &concepts).await?;
        tracing::info!(
            %plan_id,
            resources = report.resources.len(),
            failed = report.failed.len(),
            "Resource discovery complete"
        );
        Ok(report)
    }
}

/// Ask `generator` for a single task until it answers with a usable one.
///
/// Answers are cleaned first; an answer is rejected if its word count is out
/// of range or it repeats one of `previous` (case-insensitively).
async fn request_task<G: Generator>(
    generator: &G,
    cancel: &CancellationToken,
    prompt: &str,
    previous: &[String],
) -> Result<String, AppError> {
    let mut last_problem = String::new();

    for attempt in 0..=MAX_REROLLS {
        let raw = generator.generate(cancel, prompt).await?;
        let Some(task) = clean_suggestion(&raw) else {
            last_problem = "empty answer".into();
            tracing::warn!(attempt, "Generator returned an empty suggestion");
            continue;
        };

        let words = task.split_whitespace().count();
        if !(SUGGESTION_MIN_WORDS..=SUGGESTION_MAX_WORDS).contains(&words) {
            last_problem = format!("{words} words in \"{task}\"");
            tracing::warn!(attempt, words, %task, "Suggestion length out of range");
            continue;
        }

        if previous.iter().any(|p| p.eq_ignore_ascii_case(&task)) {
            last_problem = format!("duplicate suggestion \"{task}\"");
            tracing::warn!(attempt, %task, "Generator repeated an earlier suggestion");
            continue;
        }

        return Ok(task);
    }

    Err(AppError::MalformedOutput(format!(
        "no usable suggestion after {} requests: {last_problem}",
        MAX_REROLLS + 1
    )))
}

/// Reduce a model answer to a single bare task sentence.
///
/// Takes the first non-blank line, strips list markers and surrounding
/// quotes, drops trailing punctuation and collapses whitespace.
pub fn clean_suggestion(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;

    let line = strip_list_marker(line);
    let line = line.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”'));
    let line =
        line.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')' || c.is_whitespace());

    let task = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if task.is_empty() { None } else { Some(task) }
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}
