pub mod json;
pub mod outline;
pub mod text;

pub use json::{JsonConfig, JsonFormatter, content_from_json, paste_from_json, to_json};
pub use outline::{Paste, PasteMetadata, format, fragment_to_outline};
pub use text::{TextConfig, TextFormatter, convert_to_text};
