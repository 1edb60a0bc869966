//! Detection against pages that may still be rendering.
//!
//! A [`PageSource`] hands out snapshots on demand and, when the host supports
//! it, a [`MutationSubscription`] that fires whenever the watched subtree
//! changes. Both waits in this module are a subscription raced against an
//! explicit timeout; the subscription is cancelled on every exit.
//!
//! Everything here runs on a single thread. Futures are not `Send` and are
//! meant for a current-thread runtime or `block_on`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};

use crate::events::{self, PipelineEvent};
use crate::parse::{Document, compile_selector};
use crate::variant::{DetectConfig, LoadingState, PageVariant, VariantMarkers};
use crate::{Result, TanaPasteError};

/// One observed change in a watched subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    /// Monotonic per-page change counter.
    pub sequence: u64,
}

/// A live registration for mutation notifications.
///
/// Dropping the subscription cancels it; [`cancel`](Self::cancel) does the
/// same explicitly.
pub struct MutationSubscription {
    receiver: mpsc::UnboundedReceiver<Mutation>,
    on_cancel: Option<Box<dyn FnOnce()>>,
}

impl MutationSubscription {
    /// Wraps a receiver; `on_cancel` runs exactly once when the subscription ends.
    pub fn new(receiver: mpsc::UnboundedReceiver<Mutation>, on_cancel: impl FnOnce() + 'static) -> Self {
        Self { receiver, on_cancel: Some(Box::new(on_cancel)) }
    }

    /// Waits for the next mutation; `None` once the page has gone away.
    pub async fn next(&mut self) -> Option<Mutation> {
        self.receiver.recv().await
    }

    /// Stops observing.
    pub fn cancel(self) {}
}

impl Drop for MutationSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

/// A page that can be snapshotted and, optionally, observed.
pub trait PageSource {
    /// Parses the page as it is right now.
    fn snapshot(&self) -> Result<Document>;

    /// Subscribes to changes under `selector`.
    ///
    /// Returns `None` when the host cannot observe mutations.
    fn observe(&self, selector: &str) -> Option<MutationSubscription>;
}

/// A fixed snapshot that never changes and cannot be observed.
#[derive(Debug, Clone)]
pub struct StaticPage {
    html: String,
    url: Option<String>,
}

impl StaticPage {
    pub fn new(html: impl Into<String>, url: Option<String>) -> Self {
        Self { html: html.into(), url }
    }
}

impl PageSource for StaticPage {
    fn snapshot(&self) -> Result<Document> {
        match &self.url {
            Some(url) => Document::parse_with_url(&self.html, url),
            None => Document::parse(&self.html),
        }
    }

    fn observe(&self, _selector: &str) -> Option<MutationSubscription> {
        None
    }
}

type Subscribers = Rc<RefCell<Vec<(u64, mpsc::UnboundedSender<Mutation>)>>>;

/// An in-memory page whose content can be replaced while it is being watched.
///
/// Every replacement is broadcast to all live subscriptions regardless of the
/// selector they asked for.
pub struct ObservablePage {
    url: String,
    html: RefCell<String>,
    subscribers: Subscribers,
    next_id: Cell<u64>,
    sequence: Cell<u64>,
}

impl ObservablePage {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: RefCell::new(html.into()),
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
            sequence: Cell::new(0),
        }
    }

    /// Replaces the page content and notifies subscribers.
    pub fn set_html(&self, html: impl Into<String>) {
        *self.html.borrow_mut() = html.into();
        self.touch();
    }

    /// Notifies subscribers of a change without altering the content.
    pub fn touch(&self) {
        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);
        self.subscribers
            .borrow_mut()
            .retain(|(_, sender)| sender.send(Mutation { sequence }).is_ok());
    }

    /// Number of subscriptions that have not been cancelled.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl PageSource for ObservablePage {
    fn snapshot(&self) -> Result<Document> {
        Document::parse_with_url(&self.html.borrow(), &self.url)
    }

    fn observe(&self, _selector: &str) -> Option<MutationSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, sender));

        let subscribers = Rc::downgrade(&self.subscribers);
        Some(MutationSubscription::new(receiver, move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.borrow_mut().retain(|(other, _)| *other != id);
            }
        }))
    }
}

/// Classifies a page, waiting a bounded time for a presence marker to render.
///
/// Ineligible pages return [`PageVariant::Unknown`] without waiting. A marker
/// already present wins immediately. Otherwise every mutation (or, without
/// observation, every poll tick) re-checks the markers until `marker_wait_ms`
/// runs out, at which point the page is a plain [`PageVariant::Search`].
pub async fn detect_live<S: PageSource>(source: &S, config: &DetectConfig) -> Result<PageVariant> {
    let markers = config.compile()?;
    let doc = source.snapshot()?;
    let path = doc.path().map(str::to_string);

    let immediate = if markers.is_eligible(&doc) { markers.marked_variant(&doc) } else { Some(PageVariant::Unknown) };
    drop(doc);

    let variant = match immediate {
        Some(variant) => variant,
        None => wait_for_marker(source, &markers, config).await?,
    };

    events::emit(PipelineEvent::VariantDetected { variant, path });
    Ok(variant)
}

async fn wait_for_marker<S: PageSource>(
    source: &S, markers: &VariantMarkers, config: &DetectConfig,
) -> Result<PageVariant> {
    let wait = Duration::from_millis(config.marker_wait_ms);

    let raced = match source.observe("body") {
        Some(mut subscription) => {
            let raced = timeout(wait, async {
                while subscription.next().await.is_some() {
                    if let Some(variant) = markers.marked_variant(&source.snapshot()?) {
                        return Ok(Some(variant));
                    }
                }
                Ok::<_, TanaPasteError>(None)
            })
            .await;
            subscription.cancel();
            raced
        }
        None => {
            let mut ticker = interval(Duration::from_millis(config.poll_interval_ms.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            timeout(wait, async {
                loop {
                    ticker.tick().await;
                    if let Some(variant) = markers.marked_variant(&source.snapshot()?) {
                        return Ok::<_, TanaPasteError>(Some(variant));
                    }
                }
            })
            .await
        }
    };

    match raced {
        Ok(found) => Ok(found?.unwrap_or(PageVariant::Search)),
        Err(_) => {
            events::emit(PipelineEvent::MarkerWaitTimedOut { waited_ms: config.marker_wait_ms });
            Ok(PageVariant::Search)
        }
    }
}

/// Waits until the page stops changing.
///
/// Watches the answer subtree when it exists, else `body`. The page is
/// [`LoadingState::Complete`] once no mutation has been seen for
/// `stability_window_ms`, checked every `poll_interval_ms`. A host without
/// mutation observation fails open to Complete. A page still changing after
/// `stability_timeout_ms` is reported as [`LoadingState::Loading`].
pub async fn detect_loading_state<S: PageSource>(source: &S, config: &DetectConfig) -> LoadingState {
    let target = match (source.snapshot(), compile_selector(&config.loading_target)) {
        (Ok(doc), Ok(selector)) if doc.contains(&selector) => config.loading_target.as_str(),
        _ => "body",
    };

    let Some(mut subscription) = source.observe(target) else {
        events::emit(PipelineEvent::ObservationUnavailable { selector: target.to_string() });
        return LoadingState::Complete;
    };

    let window = Duration::from_millis(config.stability_window_ms);
    let deadline = Instant::now() + Duration::from_millis(config.stability_timeout_ms);
    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_mutation = Instant::now();
    let mut mutations = 0usize;
    let mut open = true;

    let state = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                if now.duration_since(last_mutation) > window {
                    break LoadingState::Complete;
                }
                if now >= deadline {
                    break LoadingState::Loading;
                }
            }
            mutation = subscription.next(), if open => match mutation {
                Some(_) => {
                    mutations += 1;
                    last_mutation = Instant::now();
                }
                None => open = false,
            },
        }
    };

    subscription.cancel();
    events::emit(PipelineEvent::LoadingStateResolved { state, mutations });
    state
}

/// What the control surface needs to know about the current page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub page_type: PageVariant,
    pub is_supported: bool,
    pub loading_state: LoadingState,
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

/// Classifies the page and waits for it to settle.
pub async fn page_context<S: PageSource>(source: &S, config: &DetectConfig) -> Result<PageContext> {
    let url = source
        .snapshot()?
        .url()
        .map(|url| url.to_string())
        .unwrap_or_default();
    let page_type = detect_live(source, config).await?;
    let loading_state = detect_loading_state(source, config).await;

    Ok(PageContext {
        url,
        page_type,
        is_supported: page_type.is_supported(),
        loading_state,
        detected_at: OffsetDateTime::now_utc(),
    })
}
