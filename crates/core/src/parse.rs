//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing a
//! rendered page snapshot and navigating it with CSS selectors.
//!
//! # Example
//!
//! ```rust
//! use tanapaste_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse_with_url(html, "https://www.perplexity.ai/search/abc").unwrap();
//! assert_eq!(doc.path(), Some("/search/abc"));
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::{PreprocessConfig, Result, TanaPasteError, preprocess};

/// Compiles a CSS selector, mapping failures to [`TanaPasteError::HtmlParseError`].
pub fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| TanaPasteError::HtmlParseError(format!("Invalid selector {selector:?}: {e}")))
}

/// Represents one parsed snapshot of a page.
///
/// A Document wraps the HTML of a rendered page together with the URL the
/// page was captured from. The URL drives page-variant detection and the
/// resolution of relative citation links.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html).unwrap();
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// assert!(doc.url().is_none());
/// ```
pub struct Document {
    html: Html,
    url: Option<Url>,
}

impl Document {
    /// Parses HTML from a string without a page URL and without preprocessing.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html, url: None })
    }

    /// Parses HTML captured from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::InvalidUrl`] if `url` is not an absolute URL.
    pub fn parse_with_url(html: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| TanaPasteError::InvalidUrl(format!("{url}: {e}")))?;
        let html = Html::parse_document(html);
        Ok(Self { html, url: Some(url) })
    }

    /// Parses HTML after stripping non-content elements.
    ///
    /// Scripts, styles and similar elements contribute nothing to the answer
    /// but do leak into raw text content, so saved page snapshots should go
    /// through this constructor.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tanapaste_core::parse::Document;
    ///
    /// let html = "<html><body><script>var x;</script><p>Content</p></body></html>";
    /// let doc = Document::parse_with_preprocessing(html, None).unwrap();
    /// assert!(!doc.text_content().contains("var x"));
    /// ```
    pub fn parse_with_preprocessing(html: &str, url: Option<Url>) -> Result<Self> {
        let cleaned = preprocess::preprocess_html(html, &PreprocessConfig::default());
        let html = Html::parse_document(&cleaned);

        Ok(Self { html, url })
    }

    /// Gets the URL the snapshot was captured from.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Gets the path component of the page URL.
    pub fn path(&self) -> Option<&str> {
        self.url.as_ref().map(Url::path)
    }

    /// Selects elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tanapaste_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html).unwrap();
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile_selector(selector)?;
        Ok(self.select_with(&sel))
    }

    /// Selects elements matching an already compiled selector, in document order.
    pub fn select_with(&'_ self, selector: &Selector) -> Vec<Element<'_>> {
        self.html.select(selector).map(Element::new).collect()
    }

    /// Gets the first element matching a compiled selector.
    pub fn find(&'_ self, selector: &Selector) -> Option<Element<'_>> {
        self.html.select(selector).next().map(Element::new)
    }

    /// Returns true if any element matches the compiled selector.
    pub fn contains(&self, selector: &Selector) -> bool {
        self.html.select(selector).next().is_some()
    }

    /// Gets the title of the document.
    ///
    /// Returns the content of the `<title>` element if present.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    /// Gets the `<body>` element.
    pub fn body(&'_ self) -> Option<Element<'_>> {
        let selector = Selector::parse("body").ok()?;
        self.find(&selector)
    }

    /// Returns true if the body holds at least one node.
    ///
    /// The HTML parser always synthesizes a body, so an empty or whitespace-only
    /// input is recognized by an empty body rather than by a parse failure.
    pub fn has_content(&self) -> bool {
        self.body().is_some_and(|body| body.element.has_children())
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// A child node of an element, as seen by the fragment converter.
#[derive(Clone, Debug)]
pub enum ChildNode<'a> {
    /// A text node.
    Text(&'a str),
    /// An element node.
    Element(Element<'a>),
    /// Comments, processing instructions and other node kinds.
    Other,
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
///
/// # Example
///
/// ```rust
/// use tanapaste_core::parse::Document;
///
/// let html = r#"<a class="source link" href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html).unwrap();
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// assert!(link.has_class("source"));
/// ```
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    /// Gets the text content of this element.
    ///
    /// Returns the concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the text content with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }

    /// Gets the value of an attribute.
    ///
    /// Returns `None` if the attribute is not present.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the tag name of this element.
    ///
    /// Returns the lowercase tag name (e.g., "div", "a", "span").
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Returns true if the element carries the given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.element.value().classes().any(|c| c == class)
    }

    /// Iterates over the class names of this element.
    pub fn classes(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.element.value().classes()
    }

    /// Iterates over the direct children of this element.
    pub fn children(&self) -> impl Iterator<Item = ChildNode<'a>> + 'a {
        self.element.children().map(|node| match node.value() {
            Node::Text(text) => ChildNode::Text(&**text),
            Node::Element(_) => ElementRef::wrap(node).map_or(ChildNode::Other, |el| ChildNode::Element(Element::new(el))),
            _ => ChildNode::Other,
        })
    }

    /// Iterates over the direct child elements of this element.
    pub fn child_elements(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        self.element.child_elements().map(Element::new)
    }

    /// Selects descendant elements using a CSS selector string.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile_selector(selector)?;
        Ok(self.select_with(&sel))
    }

    /// Selects descendant elements matching an already compiled selector.
    pub fn select_with(&self, selector: &Selector) -> Vec<Element<'a>> {
        self.element.select(selector).map(Element::new).collect()
    }

    /// Gets the first descendant matching a compiled selector.
    pub fn find(&self, selector: &Selector) -> Option<Element<'a>> {
        self.element.select(selector).next().map(Element::new)
    }
}
