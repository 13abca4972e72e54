//! In-app browser overlay lifecycle for redirect-based required actions.
//!
//! The host supplies a [`WebOverlay`]; the SDK owns the completion
//! semantics: a single channel that settles exactly once, whether the user
//! dismisses the overlay, the gateway lands on its static loading page, or
//! the flow tears the overlay down programmatically.

use crate::error::{CheckoutError, CheckoutResult};
use crate::types::PaymentMethodType;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// Navigations onto these well-known static pages mean the gateway finished
/// before the status poller noticed; the overlay is dismissed proactively.
const LOADING_PAGE_SUFFIXES: [&str; 2] = ["/static/loading.html", "/static/loading-spinner.html"];

fn is_loading_page(url: &Url) -> bool {
    LOADING_PAGE_SUFFIXES
        .iter()
        .any(|suffix| url.path().ends_with(suffix))
}

/// Events reported by the host overlay while it is presented.
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// The user closed the overlay themselves.
    UserDismissed,
    /// The overlay navigated to a new URL.
    Navigated(Url),
    /// The overlay failed to load or render.
    Failed(String),
}

/// Host-provided web overlay surface.
#[async_trait]
pub trait WebOverlay: Send + Sync {
    /// Whether a root surface exists to present over.
    fn is_ready(&self) -> bool;

    /// Prepares the root surface when [`is_ready`](Self::is_ready) is false.
    async fn prepare(&self) -> CheckoutResult<()>;

    /// Shows the overlay for `url`, resolving once it is visible. The
    /// returned receiver reports overlay events until dismissal.
    async fn show(&self, url: &Url) -> CheckoutResult<mpsc::Receiver<OverlayEvent>>;

    async fn dismiss(&self);
}

type CompletionSlot = Arc<Mutex<Option<oneshot::Sender<CheckoutResult<()>>>>>;

fn settle(slot: &CompletionSlot, result: CheckoutResult<()>) {
    let sender = slot.lock().expect("completion lock poisoned").take();
    if let Some(tx) = sender {
        let _ = tx.send(result);
    }
}

/// Exclusive owner of one overlay presentation within a submission attempt.
pub struct RedirectController {
    overlay: Arc<dyn WebOverlay>,
    payment_method_type: PaymentMethodType,
    completion_slot: CompletionSlot,
    completion_rx: Option<oneshot::Receiver<CheckoutResult<()>>>,
    watcher: Option<JoinHandle<()>>,
}

impl RedirectController {
    pub fn new(overlay: Arc<dyn WebOverlay>, payment_method_type: PaymentMethodType) -> Self {
        let (tx, rx) = oneshot::channel();
        RedirectController {
            overlay,
            payment_method_type,
            completion_slot: Arc::new(Mutex::new(Some(tx))),
            completion_rx: Some(rx),
            watcher: None,
        }
    }

    /// Presents the overlay, preparing the host surface first when needed.
    /// Resolves once the overlay is visible.
    pub async fn present(&mut self, url: &Url) -> CheckoutResult<()> {
        if !self.overlay.is_ready() {
            debug!("host surface not ready, preparing before presenting");
            self.overlay.prepare().await?;
        }

        let mut events = self.overlay.show(url).await?;
        info!(url = %url, "redirect overlay presented");

        let slot = Arc::clone(&self.completion_slot);
        let overlay = Arc::clone(&self.overlay);
        let payment_method_type = self.payment_method_type;
        self.watcher = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    OverlayEvent::UserDismissed => {
                        settle(
                            &slot,
                            Err(CheckoutError::cancelled(payment_method_type.as_str())),
                        );
                        break;
                    }
                    OverlayEvent::Navigated(url) if is_loading_page(&url) => {
                        info!(url = %url, "gateway loading page reached, dismissing overlay");
                        overlay.dismiss().await;
                        settle(&slot, Ok(()));
                        break;
                    }
                    OverlayEvent::Navigated(url) => {
                        debug!(url = %url, "overlay navigation");
                    }
                    OverlayEvent::Failed(message) => {
                        settle(&slot, Err(CheckoutError::network(message)));
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    /// The completion channel; settles exactly once. Callable once.
    pub fn completion(&mut self) -> Option<oneshot::Receiver<CheckoutResult<()>>> {
        self.completion_rx.take()
    }

    /// Programmatic dismissal: settles the channel as success (when not
    /// already settled), dismisses the overlay, and stops watching events.
    /// Must run before any subsequent branch or attempt presents again.
    pub async fn teardown(&mut self) {
        settle(&self.completion_slot, Ok(()));
        self.overlay.dismiss().await;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
