//! End-to-end workflow: extract, format, deliver.

use serde::{Deserialize, Serialize};

use crate::deliver::{DeliveryGate, ErrorCode, ExportOutcome, FallbackChannel, PrimaryChannel};
use crate::extract::StrategyRegistry;
use crate::formatters::outline::{self, Paste};
use crate::live::{PageSource, detect_live};
use crate::parse::Document;
use crate::variant::{DetectConfig, PageVariant};
use crate::Result;

/// Extracts and formats a snapshot without delivering it.
pub fn prepare(doc: &Document, variant: PageVariant, registry: &StrategyRegistry) -> Result<Paste> {
    let content = registry.extract(doc, variant)?;
    outline::format(&content)
}

/// Runs the whole workflow on one snapshot.
///
/// Extraction and formatting failures become an outcome carrying
/// [`ErrorCode::WorkflowError`] and the error text; nothing is delivered.
pub async fn run<P, F>(
    doc: &Document, variant: PageVariant, registry: &StrategyRegistry, gate: &DeliveryGate<P, F>,
) -> ExportOutcome
where
    P: PrimaryChannel,
    F: FallbackChannel,
{
    match prepare(doc, variant, registry) {
        Ok(paste) => gate.deliver(&paste).await,
        Err(err) => ExportOutcome::failed(ErrorCode::WorkflowError, err.to_string()),
    }
}

/// Reply to an extract-and-copy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters_exported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExportOutcome> for CopyResponse {
    fn from(outcome: ExportOutcome) -> Self {
        Self { success: outcome.success, characters_exported: outcome.characters_exported, error: outcome.error }
    }
}

/// Detects the variant of a live page, then runs the workflow on a fresh snapshot.
pub async fn extract_and_copy<S, P, F>(
    source: &S, detect: &DetectConfig, registry: &StrategyRegistry, gate: &DeliveryGate<P, F>,
) -> CopyResponse
where
    S: PageSource,
    P: PrimaryChannel,
    F: FallbackChannel,
{
    let variant = match detect_live(source, detect).await {
        Ok(variant) => variant,
        Err(err) => return ExportOutcome::failed(ErrorCode::WorkflowError, err.to_string()).into(),
    };

    let outcome = match source.snapshot() {
        Ok(doc) => run(&doc, variant, registry, gate).await,
        Err(err) => ExportOutcome::failed(ErrorCode::WorkflowError, err.to_string()),
    };
    outcome.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliver::{DeliveryFailure, DeliveryMethod};
    use crate::extract::ExtractConfig;
    use crate::live::StaticPage;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        written: RefCell<Vec<String>>,
    }

    impl PrimaryChannel for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        async fn write(&self, text: &str) -> std::result::Result<(), DeliveryFailure> {
            self.written.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    const URL: &str = "https://www.perplexity.ai/search/capital-abc";
    const PAGE: &str = r#"<html><body>
        <button data-testid="answer-mode-tabs-tab-research">Research</button>
        <div data-testid="query-text">capital of France</div>
        <div data-testid="answer-content"><p>Paris is the capital of France.</p></div>
    </body></html>"#;

    fn registry() -> StrategyRegistry {
        StrategyRegistry::with_defaults(&ExtractConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_run_delivers_outline() {
        let doc = Document::parse_with_url(PAGE, URL).unwrap();
        let gate = DeliveryGate::primary_only(Recorder::default());

        let outcome = run(&doc, PageVariant::Search, &registry(), &gate).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(DeliveryMethod::Primary));
        let written = gate.primary().written.borrow();
        assert_eq!(
            written.as_slice(),
            ["- **Query**: capital of France\n  - **Answer**\n    - Paris is the capital of France.".to_string()]
        );
        assert_eq!(outcome.characters_exported, Some(written[0].chars().count()));
    }

    #[tokio::test]
    async fn test_run_reports_workflow_error() {
        let doc = Document::parse_with_url(PAGE, URL).unwrap();
        let gate = DeliveryGate::primary_only(Recorder::default());

        let outcome = run(&doc, PageVariant::Unknown, &registry(), &gate).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some(ErrorCode::WorkflowError));
        assert!(gate.primary().written.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_and_copy() {
        let page = StaticPage::new(PAGE, Some(URL.to_string()));
        let gate = DeliveryGate::primary_only(Recorder::default());

        let response = extract_and_copy(&page, &DetectConfig::default(), &registry(), &gate).await;

        assert!(response.success);
        assert!(response.characters_exported.is_some_and(|n| n > 0));
        assert!(response.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_and_copy_on_unsupported_page() {
        let page = StaticPage::new(PAGE, Some("https://www.perplexity.ai/library".to_string()));
        let gate = DeliveryGate::primary_only(Recorder::default());

        let response = extract_and_copy(&page, &DetectConfig::default(), &registry(), &gate).await;

        assert!(!response.success);
        assert!(response.error.is_some());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("charactersExported").is_none());
    }
}
