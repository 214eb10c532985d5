use fireplace_core::error::AppError;
use fireplace_core::traits::LinkExtractor;
use scraper::{Html, Node};

const DEFAULT_MAX_DEPTH: usize = 512;

/// Collects the `href` of every `<a>` element, in document order.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected. The
/// parsed tree is walked with an explicit stack, so deeply nested
/// markup cannot overflow the call stack. Documents nested deeper than
/// `max_depth` are rejected.
#[derive(Debug, Clone)]
pub struct HtmlLinkExtractor {
    max_depth: usize,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, html: &[u8]) -> Result<Vec<String>, AppError> {
        // Pages in legacy encodings still yield their ASCII hrefs.
        let text = String::from_utf8_lossy(html);
        let document = Html::parse_document(&text);

        let mut links = Vec::new();
        let mut stack = vec![(document.tree.root(), 0usize)];

        while let Some((node, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(AppError::Parse(format!(
                    "Document nesting exceeds {} levels",
                    self.max_depth
                )));
            }

            if let Node::Element(element) = node.value()
                && element.name() == "a"
                && let Some(href) = element.attr("href")
            {
                links.push(href.to_string());
            }

            // Sibling below child so the child subtree is visited first.
            if let Some(sibling) = node.next_sibling() {
                stack.push((sibling, depth));
            }
            if let Some(child) = node.first_child() {
                stack.push((child, depth + 1));
            }
        }

        tracing::debug!(count = links.len(), "Extracted links");
        Ok(links)
    }
}
