pub mod config;
pub mod convert;
pub mod deliver;
pub mod error;
pub mod events;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod live;
pub mod parse;
pub mod pipeline;
pub mod preprocess;
pub mod resolve;
pub mod variant;

pub use config::{ConfigLoader, PipelineConfig};
pub use convert::{table_to_text, to_text};
pub use deliver::{
    DeliveryFailure, DeliveryGate, DeliveryMethod, ErrorCode, ExportOutcome, FailureKind, FallbackChannel, NoFallback,
    PrimaryChannel, StagingGuard,
};
pub use error::{Result, TanaPasteError};
pub use events::{EventSink, PipelineEvent, TracingSink, clear_event_sink, set_event_sink};
pub use extract::{
    Citation, ExtractConfig, ExtractConfigBuilder, ExtractedContent, ExtractionStrategy, MarkerSet, MarkerStrategy,
    MediaItem, MediaKind, StrategyRegistry,
};
pub use extract::{extract, extract_with_config};
pub use fetch::{fetch_file, fetch_input, fetch_stdin};
pub use formatters::{JsonConfig, JsonFormatter, Paste, PasteMetadata, TextConfig, TextFormatter};
pub use formatters::{content_from_json, convert_to_text, format, fragment_to_outline, paste_from_json, to_json};
pub use live::{
    Mutation, MutationSubscription, ObservablePage, PageContext, PageSource, StaticPage, detect_live,
    detect_loading_state, page_context,
};
pub use parse::{Document, Element};
pub use pipeline::{CopyResponse, extract_and_copy, prepare, run};
#[doc(hidden)]
pub use preprocess::PreprocessConfig;
pub use preprocess::preprocess_html;
pub use resolve::{Resolved, ResolverChain};
pub use variant::{DetectConfig, DetectConfigBuilder, LoadingState, PageVariant, detect, detect_with_config};
