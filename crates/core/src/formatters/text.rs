use crate::extract::ExtractedContent;

/// Configuration for the plain text summary
#[derive(Debug, Clone, Default)]
pub struct TextConfig {
    /// Wrap answer lines at specified width (0 = no wrapping)
    pub line_width: usize,
}

/// Plain text formatter producing a human-readable extraction summary
pub struct TextFormatter {
    config: TextConfig,
}

impl TextFormatter {
    pub fn new(config: TextConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, content: &ExtractedContent) -> String {
        convert_to_text(content, &self.config)
    }
}

/// Summarizes extracted content: query, answer, numbered citations and media count.
pub fn convert_to_text(content: &ExtractedContent, config: &TextConfig) -> String {
    let answer = if config.line_width > 0 { wrap_text(&content.answer, config.line_width) } else { content.answer.clone() };

    let mut output = format!("Query: {}\n\nAnswer:\n{}\n\nCitations: {}", content.query, answer, content.citations.len());
    for (index, citation) in content.citations.iter().enumerate() {
        output.push_str(&format!("\n  {}. {} - {}", index + 1, citation.title, citation.url));
    }
    output.push_str(&format!("\n\nMedia: {} items", content.media.len()));

    output
}

/// Wrap text to specified line width, keeping paragraph breaks
fn wrap_text(text: &str, width: usize) -> String {
    text.split("\n\n")
        .map(|paragraph| {
            let mut lines = Vec::new();
            let mut current = String::new();

            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                } else if current.chars().count() + 1 + word.chars().count() <= width {
                    current.push(' ');
                    current.push_str(word);
                } else {
                    lines.push(std::mem::take(&mut current));
                    current.push_str(word);
                }
            }

            if !current.is_empty() {
                lines.push(current);
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Citation, MediaItem, MediaKind};
    use crate::variant::PageVariant;
    use time::OffsetDateTime;

    fn sample() -> ExtractedContent {
        ExtractedContent {
            variant: PageVariant::Search,
            query: "capital of France".to_string(),
            answer: "Paris is the capital of France.\n\nIt is known for the Eiffel Tower.".to_string(),
            citations: vec![
                Citation { title: "Paris".to_string(), url: "https://en.wikipedia.org/wiki/Paris".to_string() },
                Citation { title: "France".to_string(), url: "https://en.wikipedia.org/wiki/France".to_string() },
            ],
            media: vec![MediaItem { kind: MediaKind::Table, markdown: "| a |\n| --- |".to_string() }],
            extracted_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_summary() {
        let text = convert_to_text(&sample(), &TextConfig::default());
        assert_eq!(
            text,
            "Query: capital of France\n\n\
             Answer:\nParis is the capital of France.\n\nIt is known for the Eiffel Tower.\n\n\
             Citations: 2\n  1. Paris - https://en.wikipedia.org/wiki/Paris\n  2. France - https://en.wikipedia.org/wiki/France\n\n\
             Media: 1 items"
        );
    }

    #[test]
    fn test_wrapped_answer() {
        let formatter = TextFormatter::new(TextConfig { line_width: 20 });
        let text = formatter.convert(&sample());
        assert!(text.contains("Paris is the capital\nof France.\n\nIt is known for the\nEiffel Tower."));
    }

    #[test]
    fn test_wrap_text_keeps_long_words() {
        assert_eq!(wrap_text("supercalifragilistic word", 5), "supercalifragilistic\nword");
    }
}
