//! Host application decision checkpoints (manual mode).
//!
//! Decisions are modeled as asynchronous request/response calls rather than
//! stored callbacks, so single-resolution comes for free. Each checkpoint
//! is wrapped in an advisory watchdog: when the host takes too long a
//! warning is logged, but the wait itself is never aborted — slow host
//! integrations are legitimate.

use crate::types::{CheckoutAdditionalInfo, CheckoutPaymentMethodData, PaymentMethodToken};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DECISION_WARNING_TIMEOUT: Duration = Duration::from_secs(5);

/// Host verdict at the pre-payment-creation checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCreationDecision {
    Continue,
    Abort(Option<String>),
}

/// Host verdict after tokenization or after a resume token arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    Succeed,
    Fail(Option<String>),
    ContinueWithNewToken(String),
    Complete,
}

/// The two asynchronous "ask the host what to do next" checkpoints, plus
/// the pending-resume notification used by voucher flows. Only consulted
/// in manual mode.
#[async_trait]
pub trait DecisionGateway: Send + Sync {
    async fn will_create_payment(
        &self,
        payment_method_data: CheckoutPaymentMethodData,
    ) -> PaymentCreationDecision;

    async fn did_tokenize(&self, token: &PaymentMethodToken) -> ResumeDecision;

    async fn did_resume(&self, resume_token: &str) -> ResumeDecision;

    async fn did_enter_resume_pending(&self, additional_info: Option<CheckoutAdditionalInfo>);
}

/// Awaits a host decision under an advisory timeout. If `decide` has not
/// resolved after `timeout`, a developer warning names the hanging
/// checkpoint; the wait continues indefinitely.
pub async fn await_decision<T, F>(checkpoint: &'static str, timeout: Duration, decide: F) -> T
where
    F: Future<Output = T>,
{
    let answered = Arc::new(AtomicBool::new(false));
    let watchdog_flag = Arc::clone(&answered);
    let watchdog = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if !watchdog_flag.load(Ordering::SeqCst) {
            warn!(
                checkpoint,
                "the decision handler has not been called; make sure the host resolves it or the flow will hang"
            );
        }
    });

    let decision = decide.await;
    answered.store(true, Ordering::SeqCst);
    watchdog.abort();
    decision
}
