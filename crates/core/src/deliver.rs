//! Delivery of outline text through a primary channel with one fallback.
//!
//! The [`DeliveryGate`] never returns an error. Every path ends in an
//! [`ExportOutcome`] that says what happened; callers who want a typed error
//! use [`ExportOutcome::into_result`].

use std::future::Future;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::events::{self, PipelineEvent};
use crate::formatters::outline::Paste;
use crate::{Result, TanaPasteError};

/// Machine-readable reason for a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Nothing to deliver
    InvalidContent,
    /// No delivery channel is available
    NotAvailable,
    /// The primary channel refused access
    PermissionDenied,
    /// Both channels failed
    CopyFailed,
    /// Extraction or formatting failed before delivery
    WorkflowError,
}

/// Which channel delivered the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Primary,
    Fallback,
}

/// Terminal result of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<DeliveryMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters_exported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ExportOutcome {
    pub fn delivered(method: DeliveryMethod, characters: usize) -> Self {
        Self {
            success: true,
            method: Some(method),
            characters_exported: Some(characters),
            error: None,
            error_code: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            method: None,
            characters_exported: None,
            error: Some(message.into()),
            error_code: Some(code),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Converts a failed outcome into the matching error kind.
    ///
    /// Returns the number of delivered characters on success.
    pub fn into_result(self) -> Result<usize> {
        if self.success {
            return Ok(self.characters_exported.unwrap_or_default());
        }

        let message = self.error.unwrap_or_else(|| "delivery failed".to_string());
        Err(match self.error_code {
            Some(ErrorCode::InvalidContent | ErrorCode::NotAvailable) => TanaPasteError::DeliveryUnavailable(message),
            Some(ErrorCode::PermissionDenied) => TanaPasteError::DeliveryPermissionDenied(message),
            Some(ErrorCode::CopyFailed | ErrorCode::WorkflowError) | None => TanaPasteError::DeliveryFailed(message),
        })
    }
}

/// How a channel failure is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The environment refused the operation
    NotAllowed,
    /// A security policy blocked the operation
    Security,
    Other,
}

/// A failed channel write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeliveryFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DeliveryFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// True for failures that must not be retried through the fallback.
    ///
    /// Matches the kind, or a message mentioning a permission, a denial or
    /// something "not allowed".
    pub fn is_permission(&self) -> bool {
        if matches!(self.kind, FailureKind::NotAllowed | FailureKind::Security) {
            return true;
        }
        let message = self.message.to_lowercase();
        ["permission", "denied", "not allowed"]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

impl From<io::Error> for DeliveryFailure {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => FailureKind::NotAllowed,
            _ => FailureKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// The preferred, asynchronous delivery channel.
pub trait PrimaryChannel {
    /// Whether the channel exists in this environment.
    fn is_available(&self) -> bool;

    /// Delivers `text`.
    fn write(&self, text: &str) -> impl Future<Output = std::result::Result<(), DeliveryFailure>>;
}

/// The synchronous fallback channel.
///
/// Delivery goes through a transient artifact: [`stage`](Self::stage) creates
/// it, [`write_fallback`](Self::write_fallback) delivers through it and
/// [`remove`](Self::remove) disposes of it. The gate guarantees `remove` runs
/// for every staged artifact.
pub trait FallbackChannel {
    type Artifact;

    fn is_available(&self) -> bool;

    fn stage(&self) -> std::result::Result<Self::Artifact, DeliveryFailure>;

    /// Delivers `text` through the artifact, returning whether it worked.
    fn write_fallback(&self, artifact: &mut Self::Artifact, text: &str) -> bool;

    fn remove(&self, artifact: Self::Artifact);
}

/// A fallback that never exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackChannel for NoFallback {
    type Artifact = ();

    fn is_available(&self) -> bool {
        false
    }

    fn stage(&self) -> std::result::Result<(), DeliveryFailure> {
        Err(DeliveryFailure::other("no fallback channel"))
    }

    fn write_fallback(&self, _artifact: &mut (), _text: &str) -> bool {
        false
    }

    fn remove(&self, _artifact: ()) {}
}

/// Owns a staged artifact and removes it when dropped.
pub struct StagingGuard<'a, F: FallbackChannel> {
    channel: &'a F,
    artifact: Option<F::Artifact>,
}

impl<'a, F: FallbackChannel> StagingGuard<'a, F> {
    /// Stages a new artifact on `channel`.
    pub fn stage(channel: &'a F) -> std::result::Result<Self, DeliveryFailure> {
        let artifact = channel.stage()?;
        Ok(Self { channel, artifact: Some(artifact) })
    }

    /// Writes through the staged artifact.
    pub fn write(&mut self, text: &str) -> bool {
        match self.artifact.as_mut() {
            Some(artifact) => self.channel.write_fallback(artifact, text),
            None => false,
        }
    }
}

impl<F: FallbackChannel> Drop for StagingGuard<'_, F> {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            self.channel.remove(artifact);
        }
    }
}

/// Validates outline text and delivers it through a primary channel, falling
/// back once.
///
/// Order of decisions:
///
/// 1. empty text → [`ErrorCode::InvalidContent`]
/// 2. no channel available → [`ErrorCode::NotAvailable`]
/// 3. primary succeeds → delivered via [`DeliveryMethod::Primary`]
/// 4. primary fails with a permission-classed failure →
///    [`ErrorCode::PermissionDenied`], the fallback is not touched
/// 5. any other failure → one fallback attempt; success is
///    [`DeliveryMethod::Fallback`], failure is [`ErrorCode::CopyFailed`]
pub struct DeliveryGate<P, F = NoFallback> {
    primary: P,
    fallback: F,
}

impl<P: PrimaryChannel> DeliveryGate<P, NoFallback> {
    /// A gate without a fallback channel.
    pub fn primary_only(primary: P) -> Self {
        Self { primary, fallback: NoFallback }
    }
}

impl<P: PrimaryChannel, F: FallbackChannel> DeliveryGate<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// Delivers the content of a paste.
    pub async fn deliver(&self, paste: &Paste) -> ExportOutcome {
        self.deliver_text(&paste.content).await
    }

    /// Delivers raw outline text.
    pub async fn deliver_text(&self, text: &str) -> ExportOutcome {
        let outcome = self.attempt(text).await;
        events::emit(PipelineEvent::DeliveryFinished { success: outcome.success, error_code: outcome.error_code });
        outcome
    }

    async fn attempt(&self, text: &str) -> ExportOutcome {
        if text.is_empty() {
            return ExportOutcome::failed(ErrorCode::InvalidContent, "content is empty");
        }

        let primary_available = self.primary.is_available();
        if !primary_available && !self.fallback.is_available() {
            return ExportOutcome::failed(ErrorCode::NotAvailable, "no delivery channel is available");
        }

        let characters = text.chars().count();
        let mut last_failure = None;

        if primary_available {
            events::emit(PipelineEvent::DeliveryAttempted { method: DeliveryMethod::Primary });
            match self.primary.write(text).await {
                Ok(()) => return ExportOutcome::delivered(DeliveryMethod::Primary, characters),
                Err(failure) => {
                    events::emit(PipelineEvent::DeliveryAttemptFailed {
                        method: DeliveryMethod::Primary,
                        message: failure.message.clone(),
                    });
                    if failure.is_permission() {
                        return ExportOutcome::failed(ErrorCode::PermissionDenied, failure.message);
                    }
                    last_failure = Some(failure);
                }
            }
        }

        match self.fallback_attempt(text) {
            Ok(()) => ExportOutcome::delivered(DeliveryMethod::Fallback, characters),
            Err(failure) => {
                events::emit(PipelineEvent::DeliveryAttemptFailed {
                    method: DeliveryMethod::Fallback,
                    message: failure.message.clone(),
                });
                let message = match last_failure {
                    Some(primary) => format!("{}; fallback: {}", primary.message, failure.message),
                    None => failure.message,
                };
                ExportOutcome::failed(ErrorCode::CopyFailed, message)
            }
        }
    }

    fn fallback_attempt(&self, text: &str) -> std::result::Result<(), DeliveryFailure> {
        if !self.fallback.is_available() {
            return Err(DeliveryFailure::other("fallback channel is not available"));
        }

        events::emit(PipelineEvent::DeliveryAttempted { method: DeliveryMethod::Fallback });
        let mut guard = StagingGuard::stage(&self.fallback)?;
        if guard.write(text) { Ok(()) } else { Err(DeliveryFailure::other("fallback write failed")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct MockPrimary {
        available: bool,
        failure: Option<DeliveryFailure>,
        calls: Cell<usize>,
        received: RefCell<Option<String>>,
    }

    impl MockPrimary {
        fn ok() -> Self {
            Self { available: true, failure: None, calls: Cell::new(0), received: RefCell::new(None) }
        }

        fn failing(failure: DeliveryFailure) -> Self {
            Self { failure: Some(failure), ..Self::ok() }
        }

        fn unavailable() -> Self {
            Self { available: false, ..Self::ok() }
        }
    }

    impl PrimaryChannel for MockPrimary {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn write(&self, text: &str) -> std::result::Result<(), DeliveryFailure> {
            self.calls.set(self.calls.get() + 1);
            match &self.failure {
                Some(failure) => Err(failure.clone()),
                None => {
                    *self.received.borrow_mut() = Some(text.to_string());
                    Ok(())
                }
            }
        }
    }

    #[derive(Default)]
    struct MockFallback {
        unavailable: bool,
        stage_fails: bool,
        write_fails: bool,
        staged: Cell<usize>,
        removed: Cell<usize>,
        written: RefCell<Vec<String>>,
    }

    impl FallbackChannel for MockFallback {
        type Artifact = String;

        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn stage(&self) -> std::result::Result<String, DeliveryFailure> {
            if self.stage_fails {
                return Err(DeliveryFailure::other("cannot create textarea"));
            }
            self.staged.set(self.staged.get() + 1);
            Ok(String::new())
        }

        fn write_fallback(&self, artifact: &mut String, text: &str) -> bool {
            artifact.push_str(text);
            if self.write_fails {
                return false;
            }
            self.written.borrow_mut().push(artifact.clone());
            true
        }

        fn remove(&self, _artifact: String) {
            self.removed.set(self.removed.get() + 1);
        }
    }

    const TEXT: &str = "- **Query**: q\n  - **Answer**\n    - été";

    #[tokio::test]
    async fn test_primary_success() {
        let gate = DeliveryGate::new(MockPrimary::ok(), MockFallback::default());
        let outcome = gate.deliver_text(TEXT).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(DeliveryMethod::Primary));
        assert_eq!(outcome.characters_exported, Some(TEXT.chars().count()));
        assert_eq!(gate.primary().received.borrow().as_deref(), Some(TEXT));
        assert_eq!(gate.fallback().staged.get(), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_ordinary_failure() {
        let gate = DeliveryGate::new(
            MockPrimary::failing(DeliveryFailure::other("document is not focused")),
            MockFallback::default(),
        );
        let outcome = gate.deliver_text(TEXT).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(DeliveryMethod::Fallback));
        assert_eq!(gate.fallback().written.borrow().as_slice(), [TEXT.to_string()]);
        assert_eq!(gate.fallback().staged.get(), 1);
        assert_eq!(gate.fallback().removed.get(), 1);
    }

    #[tokio::test]
    async fn test_permission_failure_skips_fallback() {
        for failure in [
            DeliveryFailure::new(FailureKind::NotAllowed, "blocked"),
            DeliveryFailure::new(FailureKind::Security, "insecure context"),
            DeliveryFailure::other("Write permission denied"),
            DeliveryFailure::other("Clipboard write is NOT ALLOWED here"),
        ] {
            let gate = DeliveryGate::new(MockPrimary::failing(failure), MockFallback::default());
            let outcome = gate.deliver_text(TEXT).await;

            assert!(!outcome.success);
            assert_eq!(outcome.error_code, Some(ErrorCode::PermissionDenied));
            assert_eq!(gate.fallback().staged.get(), 0);
        }
    }

    #[tokio::test]
    async fn test_both_channels_fail() {
        let fallback = MockFallback { write_fails: true, ..Default::default() };
        let gate = DeliveryGate::new(MockPrimary::failing(DeliveryFailure::other("busy")), fallback);
        let outcome = gate.deliver_text(TEXT).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_code, Some(ErrorCode::CopyFailed));
        assert!(outcome.error.as_deref().is_some_and(|e| e.contains("busy")));
        assert_eq!(gate.fallback().removed.get(), 1);
    }

    #[tokio::test]
    async fn test_stage_failure_is_copy_failed() {
        let fallback = MockFallback { stage_fails: true, ..Default::default() };
        let gate = DeliveryGate::new(MockPrimary::failing(DeliveryFailure::other("busy")), fallback);
        let outcome = gate.deliver_text(TEXT).await;

        assert_eq!(outcome.error_code, Some(ErrorCode::CopyFailed));
        assert_eq!(gate.fallback().removed.get(), 0);
    }

    #[tokio::test]
    async fn test_empty_content() {
        let gate = DeliveryGate::new(MockPrimary::ok(), MockFallback::default());
        let outcome = gate.deliver_text("").await;

        assert_eq!(outcome.error_code, Some(ErrorCode::InvalidContent));
        assert_eq!(gate.primary().calls.get(), 0);
    }

    #[tokio::test]
    async fn test_no_channel_available() {
        let fallback = MockFallback { unavailable: true, ..Default::default() };
        let gate = DeliveryGate::new(MockPrimary::unavailable(), fallback);
        let outcome = gate.deliver_text(TEXT).await;

        assert_eq!(outcome.error_code, Some(ErrorCode::NotAvailable));
    }

    #[tokio::test]
    async fn test_unavailable_primary_goes_straight_to_fallback() {
        let gate = DeliveryGate::new(MockPrimary::unavailable(), MockFallback::default());
        let outcome = gate.deliver_text(TEXT).await;

        assert_eq!(outcome.method, Some(DeliveryMethod::Fallback));
        assert_eq!(gate.primary().calls.get(), 0);
        assert_eq!(gate.fallback().removed.get(), 1);
    }

    #[tokio::test]
    async fn test_primary_only_failure() {
        let gate = DeliveryGate::primary_only(MockPrimary::failing(DeliveryFailure::other("disk full")));
        let outcome = gate.deliver_text(TEXT).await;

        assert_eq!(outcome.error_code, Some(ErrorCode::CopyFailed));
        assert_eq!(gate.primary().calls.get(), 1);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ExportOutcome::delivered(DeliveryMethod::Primary, 12).into_result().unwrap(), 12);
        assert!(matches!(
            ExportOutcome::failed(ErrorCode::NotAvailable, "none").into_result(),
            Err(TanaPasteError::DeliveryUnavailable(_))
        ));
        assert!(matches!(
            ExportOutcome::failed(ErrorCode::PermissionDenied, "no").into_result(),
            Err(TanaPasteError::DeliveryPermissionDenied(_))
        ));
        assert!(matches!(
            ExportOutcome::failed(ErrorCode::CopyFailed, "both").into_result(),
            Err(TanaPasteError::DeliveryFailed(_))
        ));
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(ExportOutcome::failed(ErrorCode::PermissionDenied, "denied")).unwrap();
        assert_eq!(json["errorCode"], "PERMISSION_DENIED");
        assert_eq!(json["success"], false);
        assert!(json.get("method").is_none());

        let json = serde_json::to_value(ExportOutcome::delivered(DeliveryMethod::Fallback, 3)).unwrap();
        assert_eq!(json["method"], "fallback");
        assert_eq!(json["charactersExported"], 3);
    }

    #[test]
    fn test_io_error_classification() {
        let failure = DeliveryFailure::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(failure.kind, FailureKind::NotAllowed);
        assert!(failure.is_permission());

        let failure = DeliveryFailure::from(io::Error::other("disk full"));
        assert!(!failure.is_permission());
    }
}
