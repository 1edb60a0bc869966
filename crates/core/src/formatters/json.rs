use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::extract::ExtractedContent;
use crate::formatters::outline::Paste;
use crate::{Result, TanaPasteError};

/// Configuration for JSON output
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Pretty print JSON output
    pub pretty: bool,
}

/// Serializes any pipeline value (content, paste, outcome) as JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T, config: &JsonConfig) -> Result<String> {
    let json = if config.pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    Ok(json)
}

fn from_json<T: DeserializeOwned>(input: &str, what: &str) -> Result<T> {
    serde_json::from_str(input).map_err(|e| TanaPasteError::InvalidInput(format!("not a valid {what}: {e}")))
}

/// Parses serialized extracted content.
///
/// # Errors
///
/// Returns [`TanaPasteError::InvalidInput`] when `input` is not valid content JSON.
pub fn content_from_json(input: &str) -> Result<ExtractedContent> {
    from_json(input, "extracted content document")
}

/// Parses a serialized paste.
pub fn paste_from_json(input: &str) -> Result<Paste> {
    from_json(input, "paste document")
}

/// JSON formatter with configurable options
pub struct JsonFormatter {
    config: JsonConfig,
}

impl JsonFormatter {
    pub fn new(config: JsonConfig) -> Self {
        Self { config }
    }

    pub fn convert<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        to_json(value, &self.config)
    }
}
