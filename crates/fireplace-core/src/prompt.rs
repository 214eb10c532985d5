//! Prompt templates for task suggestions and resource search terms.
//!
//! Everything here is a pure function of the plan focus and checklist;
//! system prompts are constants handed to a generator at construction.

use std::fmt::Write;

use crate::models::ChecklistItem;

/// System prompt for single checklist suggestions and autocompletion.
pub const CHECKLIST_SYSTEM_PROMPT: &str = "You are an AI assistant for the Fireplace productivity platform. You help users stay focused, organise their tasks, and make steady progress on their learning and work projects.

Give concise, practical, actionable answers tailored to the user's stated focus. Every checklist item you suggest must be concrete and implementable, and should be the next logical step that moves the project forward.

Keep responses under 5 sentences unless detailed instructions are explicitly requested.";

/// System prompt for the daily focus batch.
pub const DAILY_FOCUS_SYSTEM_PROMPT: &str = "You are an AI assistant for the Fireplace productivity platform. You help users decide what to work on today so that small, repeatable daily steps add up to progress on their project.

Give concise, practical, actionable answers tailored to the user's stated focus. Each suggestion must be something that fits into a single day and can be checked off when done.

Keep responses under 5 sentences unless detailed instructions are explicitly requested.";

/// System prompt for generating tutorial search terms.
pub const SEARCH_TERMS_SYSTEM_PROMPT: &str = "You are a specialised AI assistant for the Fireplace productivity platform that generates targeted search terms for finding learning resources.

Analyse the user's project focus and recent tasks and produce specific, actionable search terms that surface tutorial videos and hands-on learning material.

CORE PRINCIPLES:
- Be specific enough to find quality tutorials, not generic content
- Prefer hands-on implementation over abstract theory
- Infer the user's skill level from their tasks

SEARCH TERM REQUIREMENTS:
- Each term is 2-8 words long
- Each term is specific (\"React useEffect hook\", not \"React\")
- Terms target tutorial or how-to content
- Terms are distinct from each other
- Terms progress from foundational to more advanced concepts

RESPONSE FORMAT:
- Exactly 5 search terms
- One term per line
- No bullets, numbering, or other formatting
- No explanations or commentary
- Every line is ready to use as a video search query";

/// Number of search terms requested from the model.
pub const SEARCH_TERM_COUNT: usize = 5;

/// Minimum and maximum word count of a suggested task.
pub const SUGGESTION_MIN_WORDS: usize = 4;
pub const SUGGESTION_MAX_WORDS: usize = 20;

const NO_TASKS: &str = "(no tasks yet)";

fn write_checklist(out: &mut String, checklist: &[ChecklistItem]) {
    if checklist.is_empty() {
        out.push_str(NO_TASKS);
        out.push('\n');
        return;
    }
    for item in checklist {
        let _ = writeln!(out, "- [{}] {}", item.scope, item.description.trim());
    }
}

fn write_task_rules(out: &mut String) {
    let _ = writeln!(
        out,
        "- Begin with a verb\n- Use between {SUGGESTION_MIN_WORDS} and {SUGGESTION_MAX_WORDS} words\n- Stay within the project focus\n- Do not repeat or rephrase any task already on the checklist\n- Reply with the task only: no trailing punctuation, quotes, numbering, or commentary"
    );
}

/// Prompt asking for exactly one actionable task for the plan.
///
/// `extra` is appended verbatim as additional instructions, e.g. an
/// exclusion clause built by [`exclusion_clause`].
pub fn compose_suggestion_prompt(
    focus: &str,
    checklist: &[ChecklistItem],
    extra: Option<&str>,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Project focus: {}\n", focus.trim());
    prompt.push_str("Current checklist:\n");
    write_checklist(&mut prompt, checklist);
    prompt.push_str("\nSuggest exactly one actionable task that moves this project forward.\n");
    write_task_rules(&mut prompt);

    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        let _ = write!(prompt, "\n{extra}\n");
    }
    prompt
}

/// Exclusion clause listing suggestions already produced in this batch.
///
/// Returns `None` when there is nothing to exclude.
pub fn exclusion_clause(previous: &[String]) -> Option<String> {
    if previous.is_empty() {
        return None;
    }
    let mut clause =
        String::from("Do not suggest any of these tasks, or anything close to them:\n");
    for suggestion in previous {
        let _ = writeln!(clause, "- {suggestion}");
    }
    Some(clause)
}

/// Prompt asking the model to finish a partially typed checklist item.
pub fn compose_autocomplete_prompt(
    focus: &str,
    checklist: &[ChecklistItem],
    partial: &str,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Project focus: {}\n", focus.trim());
    prompt.push_str("Current checklist:\n");
    write_checklist(&mut prompt, checklist);
    let _ = writeln!(
        prompt,
        "\nThe user has started typing a new checklist item: \"{}\"\nComplete it into exactly one actionable task that keeps the user's wording where possible.",
        partial.trim()
    );
    write_task_rules(&mut prompt);
    prompt
}

/// Prompt asking for tutorial search terms, one per line.
pub fn compose_search_term_prompt(focus: &str, checklist: &[ChecklistItem]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Project focus: {}\n", focus.trim());
    prompt.push_str("Current checklist:\n");
    write_checklist(&mut prompt, checklist);
    let _ = writeln!(
        prompt,
        "\nGenerate exactly {SEARCH_TERM_COUNT} distinct search terms for tutorial-style videos and articles that would help with this project.\n- Each term is 2-8 words\n- One term per line\n- No numbering, bullets, or commentary\n- Order them from foundational to advanced"
    );
    prompt
}
