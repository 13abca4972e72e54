//! Status polling for redirect and challenge continuations.
//!
//! One poller is owned by the orchestrator for the lifetime of a single
//! redirect step. The resolution settles exactly once: success (the remote
//! status reaches COMPLETE), cancellation, or a transport failure after the
//! retry budget is spent.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::http::GatewayHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Pending,
    Complete,
}

/// One tick of the status endpoint. `id` becomes the resume token once the
/// status reaches `Complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResult {
    pub id: String,
    pub status: PollStatus,
}

/// Transport used by the poller; mockable for tests.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn poll_status(&self, url: &Url) -> CheckoutResult<PollResult>;
}

pub struct HttpStatusClient {
    http: GatewayHttpClient,
}

impl HttpStatusClient {
    pub fn new() -> CheckoutResult<Self> {
        Ok(Self {
            http: GatewayHttpClient::new(Duration::from_secs(15), 0)?,
        })
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn poll_status(&self, url: &Url) -> CheckoutResult<PollResult> {
        self.http
            .request_json(reqwest::Method::GET, url.as_str(), None, None)
            .await
    }
}

/// Cancels an in-flight poll, propagating the supplied error to the
/// poller's caller. Idempotent: once the poller has settled, by any means,
/// further calls have no observable effect.
#[derive(Clone)]
pub struct PollCancelHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<CheckoutError>>>>,
}

impl PollCancelHandle {
    pub fn cancel(&self, error: CheckoutError) {
        let sender = self
            .sender
            .lock()
            .expect("poll cancel lock poisoned")
            .take();
        if let Some(tx) = sender {
            // Send fails only when the poller already finished; either way
            // the channel settles at most once.
            let _ = tx.send(error);
        }
    }
}

pub struct StatusPoller {
    client: Arc<dyn StatusClient>,
    interval: Duration,
    max_tick_failures: u32,
    cancel_rx: oneshot::Receiver<CheckoutError>,
}

impl StatusPoller {
    pub fn new(client: Arc<dyn StatusClient>, interval: Duration) -> (Self, PollCancelHandle) {
        let (tx, rx) = oneshot::channel();
        let poller = StatusPoller {
            client,
            interval,
            max_tick_failures: 3,
            cancel_rx: rx,
        };
        let handle = PollCancelHandle {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (poller, handle)
    }

    /// Polls `url` until the status reaches COMPLETE or the handle cancels.
    /// Consumes the poller: one poller, one resolution.
    pub async fn start(mut self, url: &Url) -> CheckoutResult<String> {
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                biased;

                cancelled = &mut self.cancel_rx => {
                    return match cancelled {
                        Ok(error) => {
                            info!(url = %url, "status polling cancelled");
                            Err(error)
                        }
                        // Handle dropped without cancelling; treat the same
                        // as an explicit cancellation of an abandoned poll.
                        Err(_) => Err(CheckoutError::network("status polling abandoned")),
                    };
                }

                tick = self.client.poll_status(url) => {
                    match tick {
                        Ok(result) if result.status == PollStatus::Complete => {
                            info!(url = %url, "status polling complete");
                            return Ok(result.id);
                        }
                        Ok(_) => {
                            consecutive_failures = 0;
                        }
                        Err(error) => {
                            consecutive_failures += 1;
                            warn!(
                                url = %url,
                                consecutive_failures,
                                error = %error,
                                "status poll tick failed"
                            );
                            if consecutive_failures > self.max_tick_failures {
                                return Err(error);
                            }
                        }
                    }
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedStatusClient {
        completes_after: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatusClient for ScriptedStatusClient {
        async fn poll_status(&self, _url: &Url) -> CheckoutResult<PollResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.completes_after {
                Ok(PollResult {
                    id: "RESUME123".to_string(),
                    status: PollStatus::Complete,
                })
            } else {
                Ok(PollResult {
                    id: String::new(),
                    status: PollStatus::Pending,
                })
            }
        }
    }

    struct NeverCompleteClient;

    #[async_trait]
    impl StatusClient for NeverCompleteClient {
        async fn poll_status(&self, _url: &Url) -> CheckoutResult<PollResult> {
            Ok(PollResult {
                id: String::new(),
                status: PollStatus::Pending,
            })
        }
    }

    fn status_url() -> Url {
        Url::parse("https://gateway.example.com/status/abc").unwrap()
    }

    #[tokio::test]
    async fn resolves_with_resume_token_once_complete() {
        let client = Arc::new(ScriptedStatusClient {
            completes_after: 3,
            calls: AtomicU32::new(0),
        });
        let (poller, _handle) = StatusPoller::new(client.clone(), Duration::from_millis(1));
        let token = poller.start(&status_url()).await.unwrap();
        assert_eq!(token, "RESUME123");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_propagates_the_supplied_error() {
        let (poller, handle) =
            StatusPoller::new(Arc::new(NeverCompleteClient), Duration::from_millis(1));
        let url = status_url();
        let poll = tokio::spawn(async move { poller.start(&url).await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel(CheckoutError::cancelled("PAYMENT_CARD"));

        let result = poll.await.unwrap();
        assert!(matches!(result, Err(CheckoutError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn cancel_after_settlement_has_no_observable_effect() {
        let client = Arc::new(ScriptedStatusClient {
            completes_after: 1,
            calls: AtomicU32::new(0),
        });
        let (poller, handle) = StatusPoller::new(client, Duration::from_millis(1));
        let token = poller.start(&status_url()).await.unwrap();
        assert_eq!(token, "RESUME123");

        // Already settled; both calls are no-ops.
        handle.cancel(CheckoutError::cancelled("PAYMENT_CARD"));
        handle.cancel(CheckoutError::cancelled("PAYMENT_CARD"));
    }

    #[tokio::test]
    async fn repeated_cancel_sends_the_error_once() {
        let (poller, handle) =
            StatusPoller::new(Arc::new(NeverCompleteClient), Duration::from_millis(1));
        let url = status_url();
        let poll = tokio::spawn(async move { poller.start(&url).await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel(CheckoutError::cancelled("PAYMENT_CARD"));
        handle.cancel(CheckoutError::network("second cancel must be dropped"));

        match poll.await.unwrap() {
            Err(CheckoutError::Cancelled { .. }) => {}
            other => panic!("expected the first cancellation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_tick_failures() {
        struct FailingClient;

        #[async_trait]
        impl StatusClient for FailingClient {
            async fn poll_status(&self, _url: &Url) -> CheckoutResult<PollResult> {
                Err(CheckoutError::network("connection reset"))
            }
        }

        let (poller, _handle) =
            StatusPoller::new(Arc::new(FailingClient), Duration::from_millis(1));
        let result = poller.start(&status_url()).await;
        assert!(matches!(result, Err(CheckoutError::Network { .. })));
    }
}
