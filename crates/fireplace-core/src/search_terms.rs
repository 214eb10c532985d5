use crate::error::AppError;
use crate::models::Concept;

/// Split raw generator output into search terms.
///
/// One term per non-blank line, surrounding whitespace trimmed. The count is
/// not checked here; see [`to_concepts`].
pub fn parse(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn parsed terms into at most `max` concepts.
///
/// A count other than `expected` is tolerated with a warning. Fails only when
/// no term survived parsing.
pub fn to_concepts(
    terms: &[String],
    expected: usize,
    max: usize,
) -> Result<Vec<Concept>, AppError> {
    if terms.is_empty() {
        return Err(AppError::MalformedOutput(
            "generator returned no search terms".into(),
        ));
    }
    if terms.len() != expected {
        tracing::warn!(
            expected,
            received = terms.len(),
            "Unexpected number of search terms"
        );
    }
    Ok(terms.iter().take(max).map(|t| Concept::from_term(t)).collect())
}
