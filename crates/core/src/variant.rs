//! Page-variant classification.
//!
//! A snapshot is eligible only when its URL path looks like a content page
//! (`/search/<id>`). Eligible pages are told apart by two presence markers:
//! the research tab yields [`PageVariant::DeepResearch`], the studio tab yields
//! [`PageVariant::Labs`], and a page with neither is a plain
//! [`PageVariant::Search`].
//!
//! [`detect`] classifies a static snapshot. Pages that are still rendering go
//! through [`detect_live`](crate::live::detect_live), which waits a bounded time
//! for a marker to appear.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::events::{self, PipelineEvent};
use crate::parse::{Document, compile_selector};
use crate::{Result, TanaPasteError};

/// Layout category of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageVariant {
    Search,
    DeepResearch,
    Labs,
    Unknown,
}

impl PageVariant {
    /// Variants that have an extraction strategy.
    pub const SUPPORTED: [PageVariant; 3] = [PageVariant::Search, PageVariant::DeepResearch, PageVariant::Labs];

    pub fn is_supported(self) -> bool {
        self != PageVariant::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageVariant::Search => "search",
            PageVariant::DeepResearch => "deepresearch",
            PageVariant::Labs => "labs",
            PageVariant::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "deepresearch" | "deep-research" | "research" => Ok(Self::DeepResearch),
            "labs" | "studio" => Ok(Self::Labs),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid variant: {}. Valid options: search, deepresearch, labs", s)),
        }
    }
}

/// Whether a page has stopped changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    Loading,
    Complete,
}

/// Configuration for variant and loading-state detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Regex the URL path must match for the page to be eligible
    pub content_path_pattern: String,
    /// Presence marker of the deep research layout
    pub research_marker: String,
    /// Presence marker of the labs/studio layout
    pub labs_marker: String,
    /// Subtree watched for loading activity (falls back to `body`)
    pub loading_target: String,
    /// How long to wait for a presence marker to render, in milliseconds
    pub marker_wait_ms: u64,
    /// Quiet period after which a page counts as loaded, in milliseconds
    pub stability_window_ms: u64,
    /// Polling granularity of both waits, in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound on the loading-state wait, in milliseconds
    pub stability_timeout_ms: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            content_path_pattern: r"^/search/[^/]+".to_string(),
            research_marker: r#"[data-testid="answer-mode-tabs-tab-research"]"#.to_string(),
            labs_marker: r#"[data-testid="answer-mode-tabs-tab-studio"]"#.to_string(),
            loading_target: r#"[data-testid="answer-content"]"#.to_string(),
            marker_wait_ms: 2000,
            stability_window_ms: 500,
            poll_interval_ms: 100,
            stability_timeout_ms: 10_000,
        }
    }
}

impl DetectConfig {
    /// Creates a new builder for DetectConfig.
    pub fn builder() -> DetectConfigBuilder {
        DetectConfigBuilder::new()
    }

    /// Compiles the path pattern and marker selectors.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::ConfigError`] for a bad path pattern and
    /// [`TanaPasteError::HtmlParseError`] for a bad marker selector.
    pub fn compile(&self) -> Result<VariantMarkers> {
        let content_path = Regex::new(&self.content_path_pattern)
            .map_err(|e| TanaPasteError::ConfigError(format!("content_path_pattern: {e}")))?;
        Ok(VariantMarkers {
            content_path,
            research: compile_selector(&self.research_marker)?,
            labs: compile_selector(&self.labs_marker)?,
        })
    }
}

/// Builder for DetectConfig.
pub struct DetectConfigBuilder {
    config: DetectConfig,
}

impl DetectConfigBuilder {
    pub fn new() -> Self {
        Self { config: DetectConfig::default() }
    }

    /// Sets the bounded marker wait.
    pub fn marker_wait_ms(mut self, value: u64) -> Self {
        self.config.marker_wait_ms = value;
        self
    }

    /// Sets the quiet period.
    pub fn stability_window_ms(mut self, value: u64) -> Self {
        self.config.stability_window_ms = value;
        self
    }

    /// Sets the polling granularity.
    pub fn poll_interval_ms(mut self, value: u64) -> Self {
        self.config.poll_interval_ms = value;
        self
    }

    /// Sets the upper bound of the loading-state wait.
    pub fn stability_timeout_ms(mut self, value: u64) -> Self {
        self.config.stability_timeout_ms = value;
        self
    }

    /// Sets the research marker selector.
    pub fn research_marker(mut self, value: impl Into<String>) -> Self {
        self.config.research_marker = value.into();
        self
    }

    /// Sets the labs marker selector.
    pub fn labs_marker(mut self, value: impl Into<String>) -> Self {
        self.config.labs_marker = value.into();
        self
    }

    pub fn build(self) -> DetectConfig {
        self.config
    }
}

impl Default for DetectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled form of the detection rules in a [`DetectConfig`].
#[derive(Debug, Clone)]
pub struct VariantMarkers {
    content_path: Regex,
    research: Selector,
    labs: Selector,
}

impl VariantMarkers {
    /// Returns true if the snapshot's URL path is a content page.
    pub fn is_eligible(&self, doc: &Document) -> bool {
        doc.path().is_some_and(|path| self.content_path.is_match(path))
    }

    /// Checks the presence markers only; `None` when neither is rendered.
    pub fn marked_variant(&self, doc: &Document) -> Option<PageVariant> {
        if doc.contains(&self.research) {
            Some(PageVariant::DeepResearch)
        } else if doc.contains(&self.labs) {
            Some(PageVariant::Labs)
        } else {
            None
        }
    }

    /// Classifies a snapshot, defaulting to Search on an eligible page.
    pub fn classify(&self, doc: &Document) -> PageVariant {
        if !self.is_eligible(doc) {
            return PageVariant::Unknown;
        }
        self.marked_variant(doc).unwrap_or(PageVariant::Search)
    }
}

/// Classifies a snapshot with the default detection rules.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::{Document, PageVariant, detect};
///
/// let html = r#"<div data-testid="answer-mode-tabs-tab-studio"></div>"#;
/// let doc = Document::parse_with_url(html, "https://www.perplexity.ai/search/abc").unwrap();
/// assert_eq!(detect(&doc), PageVariant::Labs);
///
/// let other = Document::parse_with_url(html, "https://www.perplexity.ai/library").unwrap();
/// assert_eq!(detect(&other), PageVariant::Unknown);
/// ```
pub fn detect(doc: &Document) -> PageVariant {
    match detect_with_config(doc, &DetectConfig::default()) {
        Ok(variant) => variant,
        Err(_) => PageVariant::Unknown,
    }
}

/// Classifies a snapshot with custom detection rules.
pub fn detect_with_config(doc: &Document, config: &DetectConfig) -> Result<PageVariant> {
    let markers = config.compile()?;
    let variant = markers.classify(doc);
    events::emit(PipelineEvent::VariantDetected { variant, path: doc.path().map(str::to_string) });
    Ok(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RESEARCH: &str = r#"<html><body><button data-testid="answer-mode-tabs-tab-research">Research</button></body></html>"#;
    const LABS: &str = r#"<html><body><button data-testid="answer-mode-tabs-tab-studio">Labs</button></body></html>"#;
    const PLAIN: &str = "<html><body><p>Answer</p></body></html>";

    fn doc_at(html: &str, url: &str) -> Document {
        Document::parse_with_url(html, url).unwrap()
    }

    #[rstest]
    #[case(RESEARCH, PageVariant::DeepResearch)]
    #[case(LABS, PageVariant::Labs)]
    #[case(PLAIN, PageVariant::Search)]
    fn test_detect_on_content_page(#[case] html: &str, #[case] expected: PageVariant) {
        let doc = doc_at(html, "https://www.perplexity.ai/search/what-is-rust-abc123");
        assert_eq!(detect(&doc), expected);
    }

    #[rstest]
    #[case("https://www.perplexity.ai/")]
    #[case("https://www.perplexity.ai/search/")]
    #[case("https://www.perplexity.ai/library")]
    #[case("https://www.perplexity.ai/discover/search/abc")]
    fn test_detect_ineligible_paths(#[case] url: &str) {
        assert_eq!(detect(&doc_at(RESEARCH, url)), PageVariant::Unknown);
        assert_eq!(detect(&doc_at(PLAIN, url)), PageVariant::Unknown);
    }

    #[test]
    fn test_detect_without_url_is_unknown() {
        let doc = Document::parse(RESEARCH).unwrap();
        assert_eq!(detect(&doc), PageVariant::Unknown);
    }

    #[test]
    fn test_research_marker_wins_over_labs() {
        let html = r#"<div data-testid="answer-mode-tabs-tab-studio"></div><div data-testid="answer-mode-tabs-tab-research"></div>"#;
        let doc = doc_at(html, "https://www.perplexity.ai/search/x");
        assert_eq!(detect(&doc), PageVariant::DeepResearch);
    }

    #[test]
    fn test_invalid_marker_is_reported() {
        let config = DetectConfig::builder().labs_marker("[[nope").build();
        let doc = doc_at(PLAIN, "https://www.perplexity.ai/search/x");
        assert!(matches!(detect_with_config(&doc, &config), Err(TanaPasteError::HtmlParseError(_))));
    }

    #[test]
    fn test_variant_round_trips_through_str() {
        for variant in PageVariant::SUPPORTED {
            assert_eq!(variant.as_str().parse::<PageVariant>().unwrap(), variant);
        }
        assert!("gallery".parse::<PageVariant>().is_err());
    }

    #[test]
    fn test_variant_serializes_lowercase() {
        let json = serde_json::to_string(&PageVariant::DeepResearch).unwrap();
        assert_eq!(json, r#""deepresearch""#);
    }
}
