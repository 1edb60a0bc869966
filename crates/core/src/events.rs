//! Diagnostic events emitted by the pipeline.
//!
//! The core never logs directly. Every stage reports what it decided through
//! [`emit`], which forwards to a process-wide optional [`EventSink`]. With no
//! sink installed, emitting is a no-op and the pipeline has no side effects.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tanapaste_core::events::{self, CollectingSink, PipelineEvent};
//!
//! let sink = Arc::new(CollectingSink::new());
//! events::set_event_sink(sink.clone());
//! events::emit(PipelineEvent::MarkerWaitTimedOut { waited_ms: 2000 });
//! assert!(!sink.is_empty());
//! events::clear_event_sink();
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;

use crate::deliver::{DeliveryMethod, ErrorCode};
use crate::variant::{LoadingState, PageVariant};

/// Something the pipeline decided or observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A page variant was classified.
    VariantDetected { variant: PageVariant, path: Option<String> },
    /// No presence marker appeared before the bounded wait ran out.
    MarkerWaitTimedOut { waited_ms: u64 },
    /// The host cannot observe mutations; the caller gets a fail-open answer.
    ObservationUnavailable { selector: String },
    /// The loading-state wait finished.
    LoadingStateResolved { state: LoadingState, mutations: usize },
    /// A value was taken from the named resolver.
    Resolved { field: &'static str, source: &'static str },
    /// No resolver produced a value.
    Unresolved { field: &'static str },
    /// A citation candidate had no usable URL.
    CitationDropped { position: usize },
    /// Citations kept after both caps.
    CitationsCollected { matched: usize, kept: usize },
    /// Media fragments found by each pass.
    MediaCollected { images: usize, code: usize, tables: usize },
    /// An outline was produced.
    PasteFormatted { nodes: usize, characters: usize },
    /// A delivery path was tried.
    DeliveryAttempted { method: DeliveryMethod },
    /// A delivery path failed.
    DeliveryAttemptFailed { method: DeliveryMethod, message: String },
    /// The delivery gate reached its outcome.
    DeliveryFinished { success: bool, error_code: Option<ErrorCode> },
}

impl PipelineEvent {
    /// Short dotted name, used as the tracing message.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VariantDetected { .. } => "detect.variant",
            Self::MarkerWaitTimedOut { .. } => "detect.marker_timeout",
            Self::ObservationUnavailable { .. } => "detect.observation_unavailable",
            Self::LoadingStateResolved { .. } => "detect.loading_state",
            Self::Resolved { .. } => "extract.resolved",
            Self::Unresolved { .. } => "extract.unresolved",
            Self::CitationDropped { .. } => "extract.citation_dropped",
            Self::CitationsCollected { .. } => "extract.citations",
            Self::MediaCollected { .. } => "extract.media",
            Self::PasteFormatted { .. } => "format.paste",
            Self::DeliveryAttempted { .. } => "deliver.attempt",
            Self::DeliveryAttemptFailed { .. } => "deliver.attempt_failed",
            Self::DeliveryFinished { .. } => "deliver.finished",
        }
    }

    fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Unresolved { .. }
                | Self::DeliveryAttemptFailed { .. }
                | Self::DeliveryFinished { success: false, .. }
        )
    }
}

/// Receiver for pipeline events.
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not panic.
    fn emit(&self, event: &PipelineEvent);
}

static SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Installs the process-wide sink, replacing any previous one.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// Removes the process-wide sink.
pub fn clear_event_sink() {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Forwards an event to the installed sink, if any.
pub fn emit(event: PipelineEvent) {
    let guard = SINK.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(sink) = guard.as_ref() {
        sink.emit(&event);
    }
}

/// Sink that writes events through `tracing`.
///
/// Failures are logged at warn level, everything else at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        if event.is_failure() {
            tracing::warn!(event = ?event, "{}", event.name());
        } else {
            tracing::debug!(event = ?event, "{}", event.name());
        }
    }
}

/// Sink that records every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all collected events.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
