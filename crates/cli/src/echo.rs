use owo_colors::OwoColorize;
use tanapaste_core::{ExportOutcome, ExtractedContent, PasteMetadata};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "TanaPaste".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "Export answer pages as Tana Paste outlines\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print a labelled value under the current step
pub fn print_field(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print extraction details summary
pub fn print_extraction_details(content: &ExtractedContent) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Extraction Details".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    print_field("Variant", content.variant.as_str());
    print_field("Answer", &format!("{} chars", content.answer.chars().count()));
    print_field("Citations", &content.citations.len().to_string());
    print_field("Media", &content.media.len().to_string());
    eprintln!();
}

/// Print the counts of a formatted outline
pub fn print_paste_details(metadata: &PasteMetadata) {
    print_field("Nodes", &metadata.node_count.to_string());
    print_field("Citations", &metadata.citation_count.to_string());
    print_field("Characters", &metadata.character_count.to_string());
}

/// Print how a delivery ended
pub fn print_outcome(outcome: &ExportOutcome) {
    match (&outcome.method, outcome.characters_exported) {
        (Some(method), Some(characters)) if outcome.success => {
            print_success(&format!("Exported {} characters via {:?}", characters, method))
        }
        _ => print_error(outcome.error.as_deref().unwrap_or("delivery failed")),
    }
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
