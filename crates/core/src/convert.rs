//! Structural HTML to canonical text fragments.
//!
//! The converter understands a fixed set of elements. Headings, emphasis,
//! links, images, lists and code map to their markdown spelling; paragraph,
//! division and span recurse into their children; every other element
//! degrades to its raw text content.

use crate::parse::{ChildNode, Element};

/// Converts an element subtree into a canonical text fragment.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::convert::to_text;
/// use tanapaste_core::parse::Document;
///
/// let doc = Document::parse("<p>Rust is <strong>fast</strong> and <em>safe</em>.</p>").unwrap();
/// let p = &doc.select("p").unwrap()[0];
/// assert_eq!(to_text(p), "Rust is **fast** and *safe* .");
/// ```
pub fn to_text(element: &Element<'_>) -> String {
    let tag = element.tag_name();
    match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            format!("{} {}", "#".repeat(level), element.trimmed_text())
        }
        "strong" | "b" => format!("**{}**", element.trimmed_text()),
        "em" | "i" => format!("*{}*", element.trimmed_text()),
        "img" => format!("![{}]({})", element.attr("alt").unwrap_or_default(), element.attr("src").unwrap_or_default()),
        "pre" | "code" => format!("```\n{}\n```", element.text()),
        "a" => format!("[{}]({})", element.trimmed_text(), element.attr("href").unwrap_or_default()),
        "ul" | "ol" => element
            .child_elements()
            .filter(|child| child.tag_name() == "li")
            .map(|item| format!("- {}", item.trimmed_text()))
            .collect::<Vec<_>>()
            .join("\n"),
        "li" => format!("- {}", element.trimmed_text()),
        "p" | "div" | "span" => children_to_text(element),
        _ => element.text(),
    }
}

fn children_to_text(element: &Element<'_>) -> String {
    element
        .children()
        .filter_map(|child| match child {
            ChildNode::Text(text) => Some(text.trim().to_string()),
            ChildNode::Element(el) => Some(to_text(&el)),
            ChildNode::Other => None,
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts a table into pipe-delimited rows.
///
/// Header and data cells are treated alike. A separator row follows the first
/// row whatever kind of cells it holds. A table without rows yields an empty
/// string.
pub fn table_to_text(table: &Element<'_>) -> String {
    let Ok(rows) = table.select("tr") else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .child_elements()
            .filter(|cell| matches!(cell.tag_name().as_str(), "th" | "td"))
            .map(|cell| cell.trimmed_text())
            .collect();

        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            lines.push(format!("| {} |", vec!["---"; cells.len()].join(" | ")));
        }
    }

    lines.join("\n")
}
