//! Outline (paste) formatting.
//!
//! An outline is a list of bullets indented two spaces per level. The query is
//! the root bullet; the answer, citations and media hang off it as children.
//! A multi-line fragment keeps its first line on the bullet and its remaining
//! lines under the bullet's text column, so every line stays on an even indent.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::events::{self, PipelineEvent};
use crate::extract::{ExtractedContent, MIN_ANSWER_CHARS};
use crate::{Result, TanaPasteError};

const INDENT: &str = "  ";
const BULLET: &str = "- ";
const HEADING_SUFFIX: &str = "%%tana%%";

/// Counts describing a [`Paste`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteMetadata {
    /// Number of lines the outline reads as nodes (those opening with a bullet)
    pub node_count: usize,
    pub citation_count: usize,
    pub media_count: usize,
    /// Length of `content` in characters
    pub character_count: usize,
}

/// Outline text ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub content: String,
    pub metadata: PasteMetadata,
    #[serde(with = "time::serde::rfc3339")]
    pub formatted_at: OffsetDateTime,
}

/// Formats extracted content as an outline.
///
/// # Errors
///
/// Returns [`TanaPasteError::ExtractionIncomplete`] when the query is empty or
/// the answer is shorter than 10 characters.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::{ExtractedContent, PageVariant};
/// use tanapaste_core::formatters::outline::format;
///
/// let content = ExtractedContent {
///     variant: PageVariant::Search,
///     query: "capital of France".into(),
///     answer: "Paris is the capital of France.\n\nIt is known for the Eiffel Tower.".into(),
///     citations: vec![],
///     media: vec![],
///     extracted_at: time::OffsetDateTime::now_utc(),
/// };
///
/// let paste = format(&content).unwrap();
/// assert_eq!(
///     paste.content,
///     "- **Query**: capital of France\n  - **Answer**\n    - Paris is the capital of France.\n    - It is known for the Eiffel Tower."
/// );
/// assert_eq!(paste.metadata.node_count, 4);
/// ```
pub fn format(content: &ExtractedContent) -> Result<Paste> {
    if content.query.trim().is_empty() {
        return Err(TanaPasteError::ExtractionIncomplete("cannot format content without a query".to_string()));
    }
    if content.answer.chars().count() < MIN_ANSWER_CHARS {
        return Err(TanaPasteError::ExtractionIncomplete(format!(
            "cannot format an answer shorter than {MIN_ANSWER_CHARS} characters"
        )));
    }

    let mut lines = vec![bullet(0, &format!("**Query**: {}", content.query))];

    lines.push(bullet(1, "**Answer**"));
    lines.extend(segments(&content.answer).iter().map(|segment| node(2, segment)));

    if !content.citations.is_empty() {
        lines.push(bullet(1, "**Citations**"));
        lines.extend(
            content
                .citations
                .iter()
                .map(|citation| bullet(2, &format!("[{}]({})", citation.title, citation.url))),
        );
    }

    if !content.media.is_empty() {
        lines.push(bullet(1, "**Media**"));
        lines.extend(content.media.iter().map(|item| node(2, item.markdown.trim())));
    }

    let text = lines.join("\n");
    if !text.starts_with(BULLET) {
        return Err(TanaPasteError::FormattingInvariantViolation(
            "outline does not start with a bullet".to_string(),
        ));
    }

    let metadata = PasteMetadata {
        node_count: text.lines().filter(|line| line.trim_start().starts_with(BULLET)).count(),
        citation_count: content.citations.len(),
        media_count: content.media.len(),
        character_count: text.chars().count(),
    };
    events::emit(PipelineEvent::PasteFormatted { nodes: metadata.node_count, characters: metadata.character_count });

    Ok(Paste { content: text, metadata, formatted_at: OffsetDateTime::now_utc() })
}

fn bullet(level: usize, text: &str) -> String {
    format!("{}{BULLET}{text}", INDENT.repeat(level))
}

/// Splits an answer into paragraphs at lines that are blank once trimmed.
fn segments(answer: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in answer.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                segments.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        segments.push(current.join("\n").trim().to_string());
    }
    segments
}

/// Renders a possibly multi-line fragment as one node at `level`.
///
/// Continuation lines are dedented by their common margin and placed at the
/// bullet's text column. Their own relative indent is kept, rounded up to an
/// even width. Blank continuation lines are emitted empty.
fn node(level: usize, text: &str) -> String {
    let mut lines = text.lines();
    let mut out = bullet(level, lines.next().unwrap_or_default());

    let rest: Vec<&str> = lines.map(str::trim_end).collect();
    let margin = rest.iter().filter(|line| !line.is_empty()).map(|line| leading_spaces(line)).min().unwrap_or(0);
    let column = INDENT.repeat(level + 1);

    for line in rest {
        out.push('\n');
        if line.is_empty() {
            continue;
        }
        let body = &line[margin..];
        let own = leading_spaces(body);
        out.push_str(&column);
        out.push_str(&" ".repeat(own + own % 2));
        out.push_str(&body[own..]);
    }
    out
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Converts one canonical fragment into a single outline bullet at `level`.
///
/// Headings become bold nodes tagged `%%tana%%`, nested one extra level per
/// heading depth beyond the first. List items nest one extra level. Anything
/// else becomes a plain bullet.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::formatters::outline::fragment_to_outline;
///
/// assert_eq!(fragment_to_outline("# Title", 0), "- **Title**%%tana%%");
/// assert_eq!(fragment_to_outline("## Subtitle", 0), "  - **Subtitle**%%tana%%");
/// assert_eq!(fragment_to_outline("plain text", 1), "  - plain text");
/// ```
pub fn fragment_to_outline(fragment: &str, level: usize) -> String {
    let headings = [("# ", 0), ("## ", 1), ("### ", 2), ("#### ", 3)];
    for (prefix, extra) in headings {
        if let Some(title) = fragment.strip_prefix(prefix) {
            return bullet(level + extra, &format!("**{title}**{HEADING_SUFFIX}"));
        }
    }

    match fragment.strip_prefix(BULLET) {
        Some(item) => bullet(level + 1, item),
        None => bullet(level, fragment),
    }
}
