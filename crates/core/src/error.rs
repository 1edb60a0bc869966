//! Error types for Tana Paste operations.
//!
//! This module defines the main error type [`TanaPasteError`] which represents
//! every failure the extraction, formatting and delivery stages can surface
//! to a caller.
//!
//! # Example
//!
//! ```rust
//! use tanapaste_core::{TanaPasteError, Result};
//!
//! fn require_query(query: &str) -> Result<&str> {
//!     if query.trim().is_empty() {
//!         return Err(TanaPasteError::ExtractionIncomplete("query is empty".to_string()));
//!     }
//!     Ok(query)
//! }
//! # assert!(require_query("").is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the extract → format → deliver pipeline.
///
/// Extraction and formatting errors are fatal to the call that raised them;
/// no partial content is ever returned alongside one. Delivery errors are
/// normally reported through an [`ExportOutcome`](crate::ExportOutcome) and only
/// become one of the `Delivery*` variants through
/// [`ExportOutcome::into_result`](crate::ExportOutcome::into_result).
///
/// # Example
///
/// ```rust
/// use tanapaste_core::{Document, PageVariant, TanaPasteError, extract};
///
/// let doc = Document::parse("<html><body><p>hi</p></body></html>").unwrap();
/// match extract(&doc, PageVariant::Unknown) {
///     Err(TanaPasteError::UnsupportedVariant) => println!("not an answer page"),
///     Err(e) => println!("Error: {}", e),
///     Ok(content) => println!("Query: {}", content.query),
/// }
/// ```
#[derive(Error, Debug)]
pub enum TanaPasteError {
    /// The document or content handed to a stage is absent or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Extraction was requested for [`PageVariant::Unknown`](crate::PageVariant::Unknown).
    #[error("Cannot extract from an unsupported page variant")]
    UnsupportedVariant,

    /// The query is empty or the answer is too short after every fallback tier.
    #[error("Failed to extract core content: {0}")]
    ExtractionIncomplete(String),

    /// The generated outline broke one of its own construction rules.
    #[error("Generated outline is invalid: {0}")]
    FormattingInvariantViolation(String),

    /// No delivery mechanism could accept the content.
    #[error("Delivery unavailable: {0}")]
    DeliveryUnavailable(String),

    /// The delivery mechanism refused access.
    #[error("Delivery permission denied: {0}")]
    DeliveryPermissionDenied(String),

    /// Both the primary and the fallback delivery attempts failed.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Invalid CSS selector in a marker set.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// Invalid page URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration file errors.
    ///
    /// Returned when a configuration file exists but cannot be understood.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File read/write errors.
    #[error("I/O error: {0}")]
    WriteError(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for TanaPasteError.
pub type Result<T> = std::result::Result<T, TanaPasteError>;
