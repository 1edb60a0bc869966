//! Library API integration tests
use std::sync::Arc;

use tanapaste_core::events::CollectingSink;
use tanapaste_core::*;

const SEARCH_URL: &str = "https://www.perplexity.ai/search/capital-of-france-abc";
const RESEARCH_URL: &str = "https://www.perplexity.ai/search/rust-memory-safety-def";
const LABS_URL: &str = "https://www.perplexity.ai/search/weather-dashboard-ghi";

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn load(name: &str, url: &str) -> Document {
    let html = std::fs::read_to_string(get_fixture_path(name)).unwrap();
    Document::parse_with_url(&html, url).expect("should parse")
}

#[test]
fn test_search_fixture() {
    let doc = load("search.html", SEARCH_URL);
    let variant = detect(&doc);
    assert_eq!(variant, PageVariant::Search);

    let content = extract(&doc, variant).expect("should extract");
    assert_eq!(content.query, "capital of France");
    assert_eq!(content.answer, "Paris is the capital of France. It is known for the **Eiffel Tower** .");
    assert_eq!(
        content.citations,
        vec![
            Citation { title: "Paris - Wikipedia".into(), url: "https://en.wikipedia.org/wiki/Paris".into() },
            Citation { title: "France travel guide".into(), url: "https://www.france.fr/en".into() },
        ]
    );
    assert_eq!(content.media.len(), 1);
    assert_eq!(content.media[0].markdown, "![Eiffel Tower](https://images.example.com/eiffel.jpg)");
}

#[test]
fn test_deep_research_fixture() {
    let doc = load("deep_research.html", RESEARCH_URL);
    let variant = detect(&doc);
    assert_eq!(variant, PageVariant::DeepResearch);

    let content = extract(&doc, variant).expect("should extract");
    assert_eq!(content.variant, PageVariant::DeepResearch);
    assert_eq!(content.query, "How does Rust guarantee memory safety?");
    assert!(content.answer.contains("Every value has a single owner"));

    let urls: Vec<&str> = content.citations.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html",
            "https://blog.rust-lang.org/",
            "https://www.perplexity.ai/nomicon",
        ]
    );
    assert_eq!(content.citations[2].title, "Nomicon");

    let kinds: Vec<MediaKind> = content.media.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MediaKind::Code, MediaKind::Table]);
    assert!(content.media[0].markdown.starts_with("```rust\nfn main() {"));
    assert_eq!(
        content.media[1].markdown,
        "| Concept | Checked at |\n| --- | --- |\n| Ownership | Compile time |\n| Bounds | Run time |"
    );
}

#[test]
fn test_labs_fixture() {
    let doc = load("labs.html", LABS_URL);
    let variant = detect(&doc);
    assert_eq!(variant, PageVariant::Labs);

    let content = extract(&doc, variant).expect("should extract");
    assert_eq!(content.query, "Build a weather dashboard");
    assert_eq!(
        content.answer,
        "The dashboard shows a seven day forecast for the selected city.\n\n\
         Temperatures are plotted as a line chart with daily highs and lows."
    );
    assert!(content.citations.is_empty());
    assert_eq!(content.media.len(), 1);
    assert_eq!(content.media[0].markdown, "![Image](https://images.example.com/dashboard.png)");
}

#[test]
fn test_fixture_off_content_path_is_unknown() {
    let doc = load("search.html", "https://www.perplexity.ai/discover");
    assert_eq!(detect(&doc), PageVariant::Unknown);
    assert!(matches!(extract(&doc, PageVariant::Unknown), Err(TanaPasteError::UnsupportedVariant)));
}

fn bullet_lines(outline: &str) -> usize {
    outline.lines().filter(|line| line.trim_start().starts_with("- ")).count()
}

fn assert_even_indentation(outline: &str) {
    for line in outline.lines() {
        let leading = line.len() - line.trim_start_matches(' ').len();
        assert_eq!(leading % 2, 0, "odd indentation in {line:?}");
    }
}

#[test]
fn test_extract_then_format() {
    let doc = load("search.html", SEARCH_URL);
    let content = extract(&doc, PageVariant::Search).unwrap();
    let paste = format(&content).unwrap();

    assert!(paste.content.starts_with("- **Query**: capital of France\n"));
    assert!(paste.content.contains("\n  - **Citations**\n    - [Paris - Wikipedia](https://en.wikipedia.org/wiki/Paris)"));
    assert!(paste.content.ends_with("  - **Media**\n    - ![Eiffel Tower](https://images.example.com/eiffel.jpg)"));
    assert_eq!(paste.metadata.node_count, bullet_lines(&paste.content));
    assert_eq!(paste.metadata.citation_count, 2);
    assert_eq!(paste.metadata.media_count, 1);
    assert_eq!(paste.metadata.character_count, paste.content.chars().count());
}

#[test]
fn test_deep_research_outline_shape() {
    let doc = load("deep_research.html", RESEARCH_URL);
    let content = extract(&doc, PageVariant::DeepResearch).unwrap();
    let paste = format(&content).unwrap();

    assert_even_indentation(&paste.content);
    assert_eq!(paste.metadata.node_count, bullet_lines(&paste.content));
    assert!(paste.content.contains("    - ```rust\n      fn main() {\n          let s = String::from(\"hi\");"));
    assert!(paste.content.contains("    - | Concept | Checked at |\n      | --- | --- |\n      | Ownership | Compile time |"));
    for line in paste.content.lines().filter(|line| !line.trim_start().starts_with("- ")) {
        assert!(line.is_empty() || line.starts_with("      "), "continuation outside its bullet: {line:?}");
    }
}

#[test]
fn test_preformatted_answer_keeps_even_indentation() {
    let html = "<h1>Branching</h1><article><pre>if x {\n   y();\n}</pre></article>";
    let doc = Document::parse_with_url(html, SEARCH_URL).unwrap();
    let content = extract(&doc, PageVariant::Search).unwrap();
    let paste = format(&content).unwrap();

    assert_even_indentation(&paste.content);
    assert_eq!(paste.metadata.node_count, bullet_lines(&paste.content));
}

#[test]
fn test_serialized_fixtures() {
    let extracted = std::fs::read_to_string(get_fixture_path("extracted.json")).unwrap();
    let content = content_from_json(&extracted).unwrap();
    let paste = format(&content).unwrap();
    assert_eq!(paste.metadata.node_count, 8);

    let stored = std::fs::read_to_string(get_fixture_path("paste.json")).unwrap();
    let stored = paste_from_json(&stored).unwrap();
    assert_eq!(stored.metadata.character_count, stored.content.chars().count());
    assert!(paste.content.starts_with(&stored.content));
}

#[test]
fn test_preprocessed_snapshot() {
    let html = std::fs::read_to_string(get_fixture_path("search.html")).unwrap();
    let doc = Document::parse_with_preprocessing(&html, Some(SEARCH_URL.parse().unwrap())).unwrap();

    assert!(!doc.text_content().contains("__STATE__"));
    assert_eq!(detect(&doc), PageVariant::Search);
}

#[test]
fn test_edge_case_empty() {
    let doc = Document::parse_with_url("", SEARCH_URL).unwrap();
    assert!(matches!(extract(&doc, PageVariant::Search), Err(TanaPasteError::InvalidInput(_))));
}

#[test]
fn test_edge_case_unicode() {
    let html = r#"<h1>Qu'est-ce que la tour Eiffel ?</h1><article>La tour Eiffel est une tour de fer puddlé de 330 m.</article>"#;
    let doc = Document::parse_with_url(html, SEARCH_URL).unwrap();
    let content = extract(&doc, PageVariant::Search).unwrap();
    let paste = format(&content).unwrap();

    assert!(paste.content.contains("puddlé"));
    assert_eq!(paste.metadata.character_count, paste.content.chars().count());
}

#[test]
fn test_config_builder_limits_citations() {
    let doc = load("deep_research.html", RESEARCH_URL);
    let config = ExtractConfig::builder().max_citations(1).build();
    let content = extract_with_config(&doc, PageVariant::DeepResearch, &config).unwrap();
    assert_eq!(content.citations.len(), 1);
}

#[test]
fn test_event_sink_receives_pipeline_events() {
    let sink = Arc::new(CollectingSink::new());
    set_event_sink(sink.clone());

    let doc = load("search.html", SEARCH_URL);
    let content = extract(&doc, detect(&doc)).unwrap();
    format(&content).unwrap();
    clear_event_sink();

    let names: Vec<&str> = sink.events().iter().map(PipelineEvent::name).collect();
    for expected in ["detect.variant", "extract.resolved", "extract.citation_dropped", "extract.citations", "format.paste"] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
}
