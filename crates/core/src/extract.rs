//! Per-variant content extraction.
//!
//! Each supported [`PageVariant`] maps to an [`ExtractionStrategy`] held in a
//! [`StrategyRegistry`]. The built-in [`MarkerStrategy`] reads the query, the
//! answer, citations and media through CSS markers, falling back through
//! [`ResolverChain`]s when a marker is missing.

use std::collections::BTreeMap;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::convert::{table_to_text, to_text};
use crate::events::{self, PipelineEvent};
use crate::parse::{Document, Element, compile_selector};
use crate::resolve::ResolverChain;
use crate::variant::PageVariant;
use crate::{Result, TanaPasteError};

/// Shortest answer an extraction may succeed with, in characters.
pub const MIN_ANSWER_CHARS: usize = 10;

/// Upper bound on the number of citations in any extraction result.
pub const MAX_CITATIONS: usize = 50;

/// Title given to a citation with no readable text.
pub const UNTITLED_CITATION: &str = "Untitled";

/// CSS markers read by a [`MarkerStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSet {
    /// Dedicated query element
    pub query_marker: String,
    /// Headings scanned for the query when the marker is absent
    pub query_headings: String,
    /// Dedicated answer element
    pub answer_marker: String,
    /// Semantic containers tried in order when the answer marker is absent
    pub answer_containers: Vec<String>,
    /// Paragraphs concatenated as the last answer tier
    pub paragraphs: String,
    /// Citation candidates
    pub citations: String,
    /// Title element nested in a citation
    pub citation_title: String,
    /// Generic title class nested in a citation
    pub citation_title_fallback: String,
    /// Link nested in a citation
    pub citation_link: String,
    /// Image media
    pub images: String,
    /// Code block media
    pub code_blocks: String,
    /// Code element nested in a code block
    pub code_inner: String,
    /// Table media
    pub tables: String,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            query_marker: r#"[data-testid="query-text"]"#.to_string(),
            query_headings: "h1".to_string(),
            answer_marker: r#"[data-testid="answer-content"]"#.to_string(),
            answer_containers: vec!["main article".to_string(), "article".to_string(), "main".to_string()],
            paragraphs: "p".to_string(),
            citations: r#"[data-testid="citation"], a[href^="http"][class*="source"], .citation-link"#.to_string(),
            citation_title: r#"[data-testid="citation-title"]"#.to_string(),
            citation_title_fallback: ".title".to_string(),
            citation_link: "a".to_string(),
            images: r#"img[src^="http"]"#.to_string(),
            code_blocks: "pre".to_string(),
            code_inner: "code".to_string(),
            tables: "table".to_string(),
        }
    }
}

impl MarkerSet {
    /// Compiles every selector.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::HtmlParseError`] naming the first invalid selector.
    pub fn compile(&self) -> Result<CompiledMarkers> {
        Ok(CompiledMarkers {
            query_marker: compile_selector(&self.query_marker)?,
            query_headings: compile_selector(&self.query_headings)?,
            answer_marker: compile_selector(&self.answer_marker)?,
            answer_containers: self
                .answer_containers
                .iter()
                .map(|s| compile_selector(s))
                .collect::<Result<Vec<_>>>()?,
            paragraphs: compile_selector(&self.paragraphs)?,
            citations: compile_selector(&self.citations)?,
            citation_title: compile_selector(&self.citation_title)?,
            citation_title_fallback: compile_selector(&self.citation_title_fallback)?,
            citation_link: compile_selector(&self.citation_link)?,
            images: compile_selector(&self.images)?,
            code_blocks: compile_selector(&self.code_blocks)?,
            code_inner: compile_selector(&self.code_inner)?,
            tables: compile_selector(&self.tables)?,
            language: Regex::new(r"language-(\w+)")
                .map_err(|e| TanaPasteError::ConfigError(format!("language pattern: {e}")))?,
        })
    }
}

/// A [`MarkerSet`] with every selector compiled.
#[derive(Debug, Clone)]
pub struct CompiledMarkers {
    query_marker: Selector,
    query_headings: Selector,
    answer_marker: Selector,
    answer_containers: Vec<Selector>,
    paragraphs: Selector,
    citations: Selector,
    citation_title: Selector,
    citation_title_fallback: Selector,
    citation_link: Selector,
    images: Selector,
    code_blocks: Selector,
    code_inner: Selector,
    tables: Selector,
    language: Regex,
}

/// Configuration for content extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Shortest acceptable answer, in characters (default: 10)
    pub min_answer_chars: usize,
    /// Heading queries must be longer than this (default: 3)
    pub query_min_chars: usize,
    /// Heading queries must be shorter than this (default: 200)
    pub query_max_chars: usize,
    /// Paragraphs must be longer than this to join the fallback answer (default: 20)
    pub min_paragraph_chars: usize,
    /// How many citation candidates are inspected; `None` inspects all (default: 10)
    pub citation_scan_limit: Option<usize>,
    /// Cap on the final citation list, never above [`MAX_CITATIONS`] (default: 50)
    pub max_citations: usize,
    /// Markers shared by every variant
    pub markers: MarkerSet,
    /// Per-variant marker replacements
    pub overrides: BTreeMap<PageVariant, MarkerSet>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_answer_chars: MIN_ANSWER_CHARS,
            query_min_chars: 3,
            query_max_chars: 200,
            min_paragraph_chars: 20,
            citation_scan_limit: Some(10),
            max_citations: MAX_CITATIONS,
            markers: MarkerSet::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl ExtractConfig {
    /// Creates a new builder for ExtractConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tanapaste_core::ExtractConfig;
    ///
    /// let config = ExtractConfig::builder().citation_scan_limit(None).max_citations(20).build();
    /// assert_eq!(config.max_citations, 20);
    /// ```
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder::new()
    }

    /// Markers used for `variant`.
    pub fn markers_for(&self, variant: PageVariant) -> &MarkerSet {
        self.overrides.get(&variant).unwrap_or(&self.markers)
    }
}

/// Builder for ExtractConfig.
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ExtractConfig::default() }
    }

    /// Sets the shortest acceptable answer. Values below 10 are raised to 10.
    pub fn min_answer_chars(mut self, value: usize) -> Self {
        self.config.min_answer_chars = value.max(MIN_ANSWER_CHARS);
        self
    }

    /// Sets the exclusive length bounds for heading queries.
    pub fn query_bounds(mut self, min: usize, max: usize) -> Self {
        self.config.query_min_chars = min;
        self.config.query_max_chars = max;
        self
    }

    /// Sets the paragraph length threshold.
    pub fn min_paragraph_chars(mut self, value: usize) -> Self {
        self.config.min_paragraph_chars = value;
        self
    }

    /// Sets how many citation candidates are inspected.
    pub fn citation_scan_limit(mut self, value: Option<usize>) -> Self {
        self.config.citation_scan_limit = value;
        self
    }

    /// Sets the final citation cap.
    pub fn max_citations(mut self, value: usize) -> Self {
        self.config.max_citations = value;
        self
    }

    /// Replaces the shared markers.
    pub fn markers(mut self, markers: MarkerSet) -> Self {
        self.config.markers = markers;
        self
    }

    /// Replaces the markers of one variant.
    pub fn override_markers(mut self, variant: PageVariant, markers: MarkerSet) -> Self {
        self.config.overrides.insert(variant, markers);
        self
    }

    /// Builds the config.
    pub fn build(self) -> ExtractConfig {
        self.config
    }
}

impl Default for ExtractConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    /// Absolute http(s) URL
    pub url: String,
}

/// Kind of a rich media fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Table,
    Code,
}

/// A rich media fragment, already rendered as canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub markdown: String,
}

/// Everything read from one page snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    #[serde(rename = "pageType", alias = "variant")]
    pub variant: PageVariant,
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(with = "time::serde::rfc3339")]
    pub extracted_at: OffsetDateTime,
}

/// Extracts content from one page layout.
pub trait ExtractionStrategy: Send + Sync {
    /// The variant this strategy handles.
    fn variant(&self) -> PageVariant;

    /// Reads the page.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::ExtractionIncomplete`] when no usable query or
    /// answer is found.
    fn extract(&self, doc: &Document) -> Result<ExtractedContent>;
}

/// Strategy driven entirely by a [`MarkerSet`].
#[derive(Debug, Clone)]
pub struct MarkerStrategy {
    variant: PageVariant,
    config: ExtractConfig,
    markers: CompiledMarkers,
}

impl MarkerStrategy {
    /// Compiles the markers `config` assigns to `variant`.
    pub fn new(variant: PageVariant, config: &ExtractConfig) -> Result<Self> {
        let markers = config.markers_for(variant).compile()?;
        Ok(Self { variant, config: config.clone(), markers })
    }

    /// Where the query is looked for, in order.
    pub fn query_chain(&self) -> ResolverChain<'_, Document> {
        let markers = &self.markers;
        let (min, max) = (self.config.query_min_chars, self.config.query_max_chars);

        ResolverChain::new("query")
            .then("query-marker", move |doc: &Document| {
                doc.find(&markers.query_marker).map(|el| el.trimmed_text())
            })
            .then("heading", move |doc| {
                doc.select_with(&markers.query_headings)
                    .into_iter()
                    .map(|el| el.trimmed_text())
                    .find(|text| {
                        let len = text.chars().count();
                        len > min && len < max
                    })
            })
            .then("title", |doc| doc.title())
    }

    /// Where the answer is looked for, in order.
    pub fn answer_chain(&self) -> ResolverChain<'_, Document> {
        let markers = &self.markers;
        let min_paragraph = self.config.min_paragraph_chars;

        ResolverChain::new("answer")
            .then("answer-marker", move |doc: &Document| {
                doc.find(&markers.answer_marker).map(|el| to_text(&el))
            })
            .then("container", move |doc| {
                markers
                    .answer_containers
                    .iter()
                    .find_map(|selector| doc.find(selector))
                    .map(|el| to_text(&el))
            })
            .then("paragraphs", move |doc| {
                let paragraphs: Vec<String> = doc
                    .select_with(&markers.paragraphs)
                    .into_iter()
                    .map(|p| p.trimmed_text())
                    .filter(|text| text.chars().count() > min_paragraph)
                    .collect();
                Some(paragraphs.join("\n\n"))
            })
    }

    /// Where a citation title is looked for, in order.
    pub fn citation_title_chain<'d>(&self) -> ResolverChain<'_, Element<'d>> {
        let markers = &self.markers;

        ResolverChain::new("citation.title")
            .then("title-marker", move |el: &Element<'d>| {
                el.find(&markers.citation_title).map(|t| t.trimmed_text())
            })
            .then("title-class", move |el| {
                el.find(&markers.citation_title_fallback).map(|t| t.trimmed_text())
            })
            .then("own-text", |el| Some(el.trimmed_text()))
            .then("placeholder", |_| Some(UNTITLED_CITATION.to_string()))
    }

    /// Where a citation URL is looked for, in order.
    ///
    /// Relative links are joined onto `base`; only http(s) results are kept.
    pub fn citation_url_chain<'d>(&self, base: Option<Url>) -> ResolverChain<'_, Element<'d>> {
        let markers = &self.markers;
        let own_base = base.clone();

        ResolverChain::new("citation.url")
            .then("nested-link", move |el: &Element<'d>| {
                el.find(&markers.citation_link)
                    .and_then(|a| a.attr("href"))
                    .and_then(|href| absolute_http_url(base.as_ref(), href))
            })
            .then("own-href", move |el| {
                (el.tag_name() == "a")
                    .then(|| el.attr("href"))
                    .flatten()
                    .and_then(|href| absolute_http_url(own_base.as_ref(), href))
            })
    }

    fn citations(&self, doc: &Document) -> Vec<Citation> {
        let candidates = doc.select_with(&self.markers.citations);
        let scan_limit = self.config.citation_scan_limit.unwrap_or(usize::MAX);
        let max_citations = self.config.max_citations.min(MAX_CITATIONS);

        let titles = self.citation_title_chain();
        let urls = self.citation_url_chain(doc.url().cloned());

        let citations: Vec<Citation> = candidates
            .iter()
            .take(scan_limit)
            .enumerate()
            .filter_map(|(position, el)| {
                let Some(url) = urls.resolve(el) else {
                    events::emit(PipelineEvent::CitationDropped { position });
                    return None;
                };
                let title = titles
                    .resolve(el)
                    .map_or_else(|| UNTITLED_CITATION.to_string(), |resolved| resolved.value);
                Some(Citation { title, url: url.value })
            })
            .take(max_citations)
            .collect();

        events::emit(PipelineEvent::CitationsCollected { matched: candidates.len(), kept: citations.len() });
        citations
    }

    fn code_language(&self, block: &Element<'_>) -> Option<String> {
        let inner = block.find(&self.markers.code_inner);
        block
            .classes()
            .chain(inner.iter().flat_map(|code| code.classes()))
            .find_map(|class| {
                self.markers
                    .language
                    .captures(class)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
    }

    fn media(&self, doc: &Document) -> Vec<MediaItem> {
        let images: Vec<MediaItem> = doc
            .select_with(&self.markers.images)
            .into_iter()
            .filter_map(|img| {
                let src = img.attr("src").filter(|src| absolute_http_url(None, src).is_some())?;
                let alt = img.attr("alt").filter(|alt| !alt.is_empty()).unwrap_or("Image");
                Some(MediaItem { kind: MediaKind::Image, markdown: format!("![{alt}]({src})") })
            })
            .collect();

        let code: Vec<MediaItem> = doc
            .select_with(&self.markers.code_blocks)
            .into_iter()
            .map(|block| {
                let language = self.code_language(&block).unwrap_or_default();
                MediaItem { kind: MediaKind::Code, markdown: format!("```{language}\n{}\n```", block.text()) }
            })
            .collect();

        let tables: Vec<MediaItem> = doc
            .select_with(&self.markers.tables)
            .into_iter()
            .map(|table| table_to_text(&table))
            .filter(|markdown| !markdown.is_empty())
            .map(|markdown| MediaItem { kind: MediaKind::Table, markdown })
            .collect();

        events::emit(PipelineEvent::MediaCollected { images: images.len(), code: code.len(), tables: tables.len() });

        let mut media = images;
        media.extend(code);
        media.extend(tables);
        media
    }
}

impl ExtractionStrategy for MarkerStrategy {
    fn variant(&self) -> PageVariant {
        self.variant
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let query = self
            .query_chain()
            .resolve(doc)
            .ok_or_else(|| TanaPasteError::ExtractionIncomplete("no query found".to_string()))?;

        let min_answer = self.config.min_answer_chars.max(MIN_ANSWER_CHARS);
        let answer = self
            .answer_chain()
            .resolve_where(doc, |answer| answer.chars().count() >= min_answer)
            .ok_or_else(|| {
                TanaPasteError::ExtractionIncomplete(format!("no answer of at least {min_answer} characters found"))
            })?;

        Ok(ExtractedContent {
            variant: self.variant,
            query: query.value,
            answer: answer.value,
            citations: self.citations(doc),
            media: self.media(doc),
            extracted_at: OffsetDateTime::now_utc(),
        })
    }
}

fn absolute_http_url(base: Option<&Url>, href: &str) -> Option<String> {
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Maps each supported variant to its extraction strategy.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::{ExtractConfig, PageVariant, StrategyRegistry};
///
/// let registry = StrategyRegistry::with_defaults(&ExtractConfig::default()).unwrap();
/// assert_eq!(registry.variants(), vec![PageVariant::Search, PageVariant::DeepResearch, PageVariant::Labs]);
/// ```
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<PageVariant, Box<dyn ExtractionStrategy>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a [`MarkerStrategy`] for every supported variant.
    pub fn with_defaults(config: &ExtractConfig) -> Result<Self> {
        let mut registry = Self::new();
        for variant in PageVariant::SUPPORTED {
            registry.register(MarkerStrategy::new(variant, config)?);
        }
        Ok(registry)
    }

    /// Adds a strategy, returning the one it replaces.
    pub fn register(&mut self, strategy: impl ExtractionStrategy + 'static) -> Option<Box<dyn ExtractionStrategy>> {
        self.strategies.insert(strategy.variant(), Box::new(strategy))
    }

    pub fn get(&self, variant: PageVariant) -> Option<&dyn ExtractionStrategy> {
        self.strategies.get(&variant).map(|strategy| strategy.as_ref())
    }

    /// Registered variants in order.
    pub fn variants(&self) -> Vec<PageVariant> {
        self.strategies.keys().copied().collect()
    }

    /// Extracts `doc` with the strategy registered for `variant`.
    ///
    /// # Errors
    ///
    /// - [`TanaPasteError::UnsupportedVariant`] for Unknown or an unregistered variant
    /// - [`TanaPasteError::InvalidInput`] for a document without content
    /// - [`TanaPasteError::ExtractionIncomplete`] when the result has no query or
    ///   a too-short answer
    pub fn extract(&self, doc: &Document, variant: PageVariant) -> Result<ExtractedContent> {
        if !variant.is_supported() {
            return Err(TanaPasteError::UnsupportedVariant);
        }
        let strategy = self.get(variant).ok_or(TanaPasteError::UnsupportedVariant)?;
        if !doc.has_content() {
            return Err(TanaPasteError::InvalidInput("document has no content".to_string()));
        }

        let mut content = strategy.extract(doc)?;
        if content.query.trim().is_empty() {
            return Err(TanaPasteError::ExtractionIncomplete("query is empty".to_string()));
        }
        if content.answer.chars().count() < MIN_ANSWER_CHARS {
            return Err(TanaPasteError::ExtractionIncomplete(format!(
                "answer is shorter than {MIN_ANSWER_CHARS} characters"
            )));
        }
        content.citations.truncate(MAX_CITATIONS);
        content.variant = variant;
        Ok(content)
    }
}

/// Extracts a page with the default markers.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::{Document, PageVariant, extract};
///
/// let html = r#"<h1>capital of France</h1><div data-testid="answer-content"><p>Paris is the capital.</p></div>"#;
/// let doc = Document::parse(html).unwrap();
/// let content = extract(&doc, PageVariant::Search).unwrap();
/// assert_eq!(content.query, "capital of France");
/// assert_eq!(content.answer, "Paris is the capital.");
/// ```
pub fn extract(doc: &Document, variant: PageVariant) -> Result<ExtractedContent> {
    extract_with_config(doc, variant, &ExtractConfig::default())
}

/// Extracts a page with custom configuration.
pub fn extract_with_config(doc: &Document, variant: PageVariant, config: &ExtractConfig) -> Result<ExtractedContent> {
    if !variant.is_supported() {
        return Err(TanaPasteError::UnsupportedVariant);
    }
    StrategyRegistry::with_defaults(config)?.extract(doc, variant)
}
