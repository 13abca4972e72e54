//! Payment submission pipeline.
//!
//! One orchestrator instance drives one payment method for one session.
//! A submission runs the stages in order: validate, pre-creation checkpoint,
//! tokenize, create or hand off, required-action continuation, resume. The
//! attempt ends with exactly one terminal event, completed or failed, in
//! both handling modes.

use crate::decisions::{
    await_decision, DecisionGateway, PaymentCreationDecision, ResumeDecision,
    DECISION_WARNING_TIMEOUT,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::challenge::ChallengeHandler;
use crate::gateway::payments::{ensure_processable, CreateResumeClient};
use crate::gateway::tokenization::TokenizationClient;
use crate::methods::{builder_for, PaymentData, TokenizationBuilder};
use crate::polling::{StatusClient, StatusPoller};
use crate::redirect::{RedirectController, WebOverlay};
use crate::session::{PaymentHandling, SessionContext, SessionIntent};
use crate::token::{DecodedContinuationToken, RequiredActionIntent};
use crate::types::{
    CheckoutAdditionalInfo, CheckoutData, CheckoutPaymentMethodData, PaymentMethodToken,
    PaymentMethodType,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Flow progress and terminal outcome notifications. Progress hooks default
/// to no-ops; the terminal pair must be handled.
#[async_trait]
pub trait CheckoutEventSink: Send + Sync {
    async fn preparation_started(&self, _payment_method_type: PaymentMethodType) {}

    async fn tokenization_started(&self, _payment_method_type: PaymentMethodType) {}

    async fn overlay_dismissed(&self, _payment_method_type: PaymentMethodType) {}

    async fn checkout_completed(&self, data: CheckoutData);

    /// `data` carries whatever payment identifiers were learned before the
    /// failure; known ids are never discarded.
    async fn checkout_failed(&self, error: CheckoutError, data: Option<CheckoutData>);
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub poll_interval: Duration,
    pub decision_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        OrchestratorOptions {
            poll_interval: Duration::from_secs(1),
            decision_timeout: DECISION_WARNING_TIMEOUT,
        }
    }
}

/// Everything the orchestrator talks to. All seams are traits so hosts and
/// tests can substitute their own.
pub struct Collaborators {
    pub tokenization: Arc<dyn TokenizationClient>,
    pub payments: Arc<dyn CreateResumeClient>,
    pub status: Arc<dyn StatusClient>,
    pub decisions: Arc<dyn DecisionGateway>,
    pub challenge: Arc<dyn ChallengeHandler>,
    pub overlay: Arc<dyn WebOverlay>,
    pub events: Arc<dyn CheckoutEventSink>,
}

/// Mutable state of a single submission attempt. Dropped when the attempt
/// ends; nothing leaks into the next submission.
#[derive(Default)]
struct Attempt {
    checkout_data: Option<CheckoutData>,
    resume_payment_id: Option<String>,
}

impl Attempt {
    fn attach_additional_info(&mut self, info: CheckoutAdditionalInfo) {
        self.checkout_data
            .get_or_insert_with(CheckoutData::default)
            .additional_info = Some(info);
    }
}

pub struct PaymentFlowOrchestrator {
    session: SessionContext,
    payment_method_type: PaymentMethodType,
    builder: Arc<dyn TokenizationBuilder>,
    collaborators: Collaborators,
    options: OrchestratorOptions,
    in_flight: AtomicBool,
}

impl PaymentFlowOrchestrator {
    pub fn new(
        session: SessionContext,
        payment_method_type: PaymentMethodType,
        collaborators: Collaborators,
        options: OrchestratorOptions,
    ) -> Self {
        let builder = builder_for(payment_method_type, &session);
        PaymentFlowOrchestrator {
            session,
            payment_method_type,
            builder,
            collaborators,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn payment_method_type(&self) -> PaymentMethodType {
        self.payment_method_type
    }

    /// Runs one submission attempt to its terminal outcome. Exactly one of
    /// `checkout_completed` / `checkout_failed` fires per accepted call; a
    /// call rejected because another submission is running reports only
    /// through its return value.
    pub async fn submit(&self, data: PaymentData) -> CheckoutResult<CheckoutData> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                payment_method_type = %self.payment_method_type,
                "submission rejected, another one is in flight"
            );
            return Err(CheckoutError::payment_failed(
                "A payment submission is already in progress",
            ));
        }

        let mut attempt = Attempt::default();
        let outcome = self.run_attempt(&data, &mut attempt).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match outcome {
            Ok(checkout_data) => {
                info!(
                    payment_method_type = %self.payment_method_type,
                    payment_id = checkout_data.payment.id.as_deref().unwrap_or("unknown"),
                    "checkout completed"
                );
                self.collaborators
                    .events
                    .checkout_completed(checkout_data.clone())
                    .await;
                Ok(checkout_data)
            }
            Err(error) => {
                warn!(
                    payment_method_type = %self.payment_method_type,
                    diagnostics_id = error.diagnostics_id(),
                    error = %error,
                    "checkout failed"
                );
                self.collaborators
                    .events
                    .checkout_failed(error.clone(), attempt.checkout_data.clone())
                    .await;
                Err(error)
            }
        }
    }

    async fn run_attempt(
        &self,
        data: &PaymentData,
        attempt: &mut Attempt,
    ) -> CheckoutResult<CheckoutData> {
        let events = &self.collaborators.events;
        events.preparation_started(self.payment_method_type).await;

        self.builder
            .validate(data)
            .map_err(CheckoutError::underlying)?;

        self.pre_creation_checkpoint().await?;

        events.tokenization_started(self.payment_method_type).await;
        let request = self.builder.build_request_body(data)?;
        let token = self.collaborators.tokenization.tokenize(&request).await?;

        let mut continuation = self.start_payment_flow(&token, attempt).await?;

        while let Some(decoded) = continuation.take() {
            let resume_token = self.handle_continuation(&decoded, &token, data, attempt).await?;
            let Some(resume_token) = resume_token else {
                // Informational completion, e.g. voucher instructions; the
                // payment settles out of band.
                break;
            };
            continuation = self.resume(&resume_token, attempt).await?;
        }

        Ok(attempt.checkout_data.clone().unwrap_or_default())
    }

    /// Manual-mode hosts may abort before any payment exists. Skipped
    /// entirely when vaulting: there is no payment to veto.
    async fn pre_creation_checkpoint(&self) -> CheckoutResult<()> {
        if self.session.payment_handling() != PaymentHandling::Manual
            || self.session.intent() == SessionIntent::Vault
        {
            return Ok(());
        }

        let decision = await_decision(
            "will_create_payment",
            self.options.decision_timeout,
            self.collaborators
                .decisions
                .will_create_payment(CheckoutPaymentMethodData {
                    payment_method_type: self.payment_method_type,
                }),
        )
        .await;

        match decision {
            PaymentCreationDecision::Continue => Ok(()),
            PaymentCreationDecision::Abort(message) => {
                info!(
                    payment_method_type = %self.payment_method_type,
                    "host aborted payment creation"
                );
                Err(CheckoutError::merchant_error(message))
            }
        }
    }

    /// After tokenization the modes diverge: auto creates the payment and
    /// follows its required action, manual asks the host what to do with the
    /// token. Either way the result is an optional continuation token.
    async fn start_payment_flow(
        &self,
        token: &PaymentMethodToken,
        attempt: &mut Attempt,
    ) -> CheckoutResult<Option<DecodedContinuationToken>> {
        match self.session.payment_handling() {
            PaymentHandling::Manual => {
                let decision = await_decision(
                    "did_tokenize",
                    self.options.decision_timeout,
                    self.collaborators.decisions.did_tokenize(token),
                )
                .await;

                match decision {
                    ResumeDecision::Succeed | ResumeDecision::Complete => Ok(None),
                    ResumeDecision::Fail(message) => Err(CheckoutError::merchant_error(message)),
                    ResumeDecision::ContinueWithNewToken(raw) => {
                        Ok(Some(DecodedContinuationToken::decode(&raw)?))
                    }
                }
            }
            PaymentHandling::Auto => {
                let response = match self.collaborators.payments.create_payment(&token.token).await
                {
                    Ok(response) => response,
                    Err(call) => {
                        if let Some(partial) = call.partial_response {
                            attempt.checkout_data =
                                Some(CheckoutData::from_payment_response(&partial));
                        }
                        return Err(call.error);
                    }
                };
                let response = ensure_processable(response, "create")?;

                attempt.checkout_data = Some(CheckoutData::from_payment_response(&response));
                attempt.resume_payment_id = response.id.clone();

                match response.required_action {
                    Some(action) => {
                        info!(
                            payment_method_type = %self.payment_method_type,
                            required_action = action.name,
                            "payment requires further action"
                        );
                        Ok(Some(DecodedContinuationToken::decode(&action.client_token)?))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Branches on the continuation token's intent and yields the resume
    /// token, or `None` for informational completions.
    async fn handle_continuation(
        &self,
        decoded: &DecodedContinuationToken,
        token: &PaymentMethodToken,
        data: &PaymentData,
        attempt: &mut Attempt,
    ) -> CheckoutResult<Option<String>> {
        match decoded.required_action_intent() {
            RequiredActionIntent::ThreeDsAuthentication => {
                let resume_token = self
                    .collaborators
                    .challenge
                    .perform_challenge(token)
                    .await
                    .map_err(|error| {
                        CheckoutError::three_ds_failed(
                            self.payment_method_type.as_str(),
                            error.to_string(),
                        )
                    })?;
                Ok(Some(resume_token))
            }
            RequiredActionIntent::ProcessorThreeDs => {
                // Both URLs are mandatory here; a token lacking either is
                // unusable, the same as a malformed one.
                let redirect_url = decoded
                    .redirect_url
                    .as_ref()
                    .ok_or_else(CheckoutError::invalid_client_token)?;
                let status_url = decoded
                    .status_url
                    .as_ref()
                    .ok_or_else(CheckoutError::invalid_client_token)?;
                self.redirect_and_poll(Some(redirect_url), status_url)
                    .await
                    .map(Some)
            }
            RequiredActionIntent::Redirection => {
                let status_url = decoded
                    .status_url
                    .as_ref()
                    .ok_or_else(CheckoutError::invalid_client_token)?;
                self.redirect_and_poll(decoded.redirect_url.as_ref(), status_url)
                    .await
                    .map(Some)
            }
            RequiredActionIntent::PaymentMethodVoucher => {
                self.handle_voucher(decoded, data, attempt).await?;
                Ok(None)
            }
            RequiredActionIntent::Checkout | RequiredActionIntent::Other(_) => {
                Err(CheckoutError::invalid_value(
                    "resumeToken",
                    format!(
                        "Unsupported required action intent '{}'",
                        decoded.intent.as_deref().unwrap_or("")
                    ),
                ))
            }
        }
    }

    /// Presents the redirect overlay (when a redirect URL exists) and polls
    /// the status endpoint until it yields a resume token. User dismissal
    /// cancels the poll; either way the overlay is torn down before the flow
    /// moves on.
    async fn redirect_and_poll(
        &self,
        redirect_url: Option<&Url>,
        status_url: &Url,
    ) -> CheckoutResult<String> {
        let (poller, cancel_handle) =
            StatusPoller::new(Arc::clone(&self.collaborators.status), self.options.poll_interval);

        let mut controller = match redirect_url {
            Some(url) => {
                let mut controller = RedirectController::new(
                    Arc::clone(&self.collaborators.overlay),
                    self.payment_method_type,
                );
                controller.present(url).await?;
                if let Some(completion) = controller.completion() {
                    let cancel = cancel_handle.clone();
                    tokio::spawn(async move {
                        if let Ok(Err(error)) = completion.await {
                            cancel.cancel(error);
                        }
                    });
                }
                Some(controller)
            }
            None => None,
        };

        let result = poller.start(status_url).await;

        if let Some(controller) = controller.as_mut() {
            controller.teardown().await;
            self.collaborators
                .events
                .overlay_dismissed(self.payment_method_type)
                .await;
        }

        result
    }

    /// Voucher continuations complete informationally: the instructions go
    /// into the terminal result and, in manual mode, the host is told the
    /// payment is now pending out-of-band settlement.
    async fn handle_voucher(
        &self,
        decoded: &DecodedContinuationToken,
        data: &PaymentData,
        attempt: &mut Attempt,
    ) -> CheckoutResult<()> {
        let expires_at = decoded
            .expires_at_datetime()
            .ok_or_else(|| missing_token_field("expiresAt"))?;
        let reference = decoded
            .reference
            .as_deref()
            .ok_or_else(|| missing_token_field("reference"))?;

        let retailer_name = match data {
            PaymentData::Retailer(retailer) => self
                .session
                .initialization_data()
                .and_then(|init| init.retailer_name(&retailer.retailer_id))
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        let info = CheckoutAdditionalInfo::Voucher {
            coupon_code: reference.to_string(),
            expires_at: expires_at.to_rfc3339(),
            retailer_name,
        };
        attempt.attach_additional_info(info.clone());

        info!(
            payment_method_type = %self.payment_method_type,
            reference,
            "voucher issued, payment settles out of band"
        );

        if self.session.payment_handling() == PaymentHandling::Manual {
            self.collaborators
                .decisions
                .did_enter_resume_pending(Some(info))
                .await;
        }

        Ok(())
    }

    /// Manual mode asks the host; auto mode resumes the stored payment.
    /// Returns the next continuation token when the host supplies one.
    async fn resume(
        &self,
        resume_token: &str,
        attempt: &mut Attempt,
    ) -> CheckoutResult<Option<DecodedContinuationToken>> {
        match self.session.payment_handling() {
            PaymentHandling::Manual => {
                let decision = await_decision(
                    "did_resume",
                    self.options.decision_timeout,
                    self.collaborators.decisions.did_resume(resume_token),
                )
                .await;

                match decision {
                    ResumeDecision::Succeed | ResumeDecision::Complete => Ok(None),
                    ResumeDecision::Fail(message) => Err(CheckoutError::merchant_error(message)),
                    ResumeDecision::ContinueWithNewToken(raw) => {
                        Ok(Some(DecodedContinuationToken::decode(&raw)?))
                    }
                }
            }
            PaymentHandling::Auto => {
                let payment_id = attempt.resume_payment_id.clone().ok_or_else(|| {
                    CheckoutError::invalid_value(
                        "resumePaymentId",
                        "No payment id stored for this attempt",
                    )
                })?;

                let response = match self
                    .collaborators
                    .payments
                    .resume_payment(&payment_id, resume_token)
                    .await
                {
                    Ok(response) => response,
                    Err(call) => {
                        if let Some(partial) = call.partial_response {
                            attempt.checkout_data =
                                Some(CheckoutData::from_payment_response(&partial));
                        }
                        return Err(call.error);
                    }
                };
                let response = ensure_processable(response, "resume")?;

                // The resume response supersedes the create response, but
                // voucher instructions gathered along the way survive.
                let additional_info = attempt
                    .checkout_data
                    .as_ref()
                    .and_then(|data| data.additional_info.clone());
                let mut checkout_data = CheckoutData::from_payment_response(&response);
                checkout_data.additional_info = additional_info;
                attempt.checkout_data = Some(checkout_data);

                Ok(None)
            }
        }
    }
}

fn missing_token_field(key: &str) -> CheckoutError {
    CheckoutError::invalid_value(key, format!("Required token field '{key}' is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::payments::PaymentCallError;
    use crate::gateway::tokenization::TokenizationRequest;
    use crate::methods::CardData;
    use crate::polling::{PollResult, PollStatus};
    use crate::redirect::OverlayEvent;
    use crate::types::{PaymentResponse, PaymentStatus, RequiredAction};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    fn encode_token(payload: serde_json::Value) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn client_token() -> String {
        encode_token(serde_json::json!({
            "intent": "CHECKOUT",
            "accessToken": "access-1",
            "coreUrl": "https://api.gateway.example.com",
            "pciUrl": "https://pci.gateway.example.com",
        }))
    }

    fn session(handling: PaymentHandling, intent: SessionIntent) -> SessionContext {
        SessionContext::new(client_token(), handling, intent).unwrap()
    }

    fn card_data() -> PaymentData {
        PaymentData::Card(CardData {
            card_number: "4242 4242 4242 4242".to_string(),
            expiry_date: "12/2031".to_string(),
            cvv: "123".to_string(),
            cardholder_name: Some("J Appleseed".to_string()),
        })
    }

    #[derive(Default)]
    struct MockTokenization {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenizationClient for MockTokenization {
        async fn tokenize(
            &self,
            _request: &TokenizationRequest,
        ) -> CheckoutResult<PaymentMethodToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentMethodToken {
                token: "tok_1".to_string(),
                payment_method_type: PaymentMethodType::PaymentCard,
                analytics_id: None,
                payment_instrument_data: None,
            })
        }
    }

    struct MockPayments {
        create_response: StdMutex<Option<Result<PaymentResponse, PaymentCallError>>>,
        resume_response: StdMutex<Option<Result<PaymentResponse, PaymentCallError>>>,
        create_calls: AtomicU32,
        resume_calls: AtomicU32,
        resumed_with: StdMutex<Option<(String, String)>>,
    }

    impl MockPayments {
        fn new(
            create: Option<Result<PaymentResponse, PaymentCallError>>,
            resume: Option<Result<PaymentResponse, PaymentCallError>>,
        ) -> Self {
            MockPayments {
                create_response: StdMutex::new(create),
                resume_response: StdMutex::new(resume),
                create_calls: AtomicU32::new(0),
                resume_calls: AtomicU32::new(0),
                resumed_with: StdMutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CreateResumeClient for MockPayments {
        async fn create_payment(&self, _token: &str) -> Result<PaymentResponse, PaymentCallError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.create_response
                .lock()
                .unwrap()
                .take()
                .expect("unexpected create_payment call")
        }

        async fn resume_payment(
            &self,
            payment_id: &str,
            resume_token: &str,
        ) -> Result<PaymentResponse, PaymentCallError> {
            self.resume_calls.fetch_add(1, Ordering::SeqCst);
            *self.resumed_with.lock().unwrap() =
                Some((payment_id.to_string(), resume_token.to_string()));
            self.resume_response
                .lock()
                .unwrap()
                .take()
                .expect("unexpected resume_payment call")
        }
    }

    struct MockStatus {
        completes_after: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatusClient for MockStatus {
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

    struct MockDecisions {
        creation: PaymentCreationDecision,
        tokenize: ResumeDecision,
        resume: ResumeDecision,
        will_create_calls: AtomicU32,
        did_tokenize_calls: AtomicU32,
        did_resume_calls: AtomicU32,
        resume_pending: StdMutex<Vec<Option<CheckoutAdditionalInfo>>>,
    }

    impl MockDecisions {
        fn new(
            creation: PaymentCreationDecision,
            tokenize: ResumeDecision,
            resume: ResumeDecision,
        ) -> Self {
            MockDecisions {
                creation,
                tokenize,
                resume,
                will_create_calls: AtomicU32::new(0),
                did_tokenize_calls: AtomicU32::new(0),
                did_resume_calls: AtomicU32::new(0),
                resume_pending: StdMutex::new(Vec::new()),
            }
        }

        fn auto_defaults() -> Self {
            Self::new(
                PaymentCreationDecision::Continue,
                ResumeDecision::Succeed,
                ResumeDecision::Succeed,
            )
        }
    }

    #[async_trait]
    impl DecisionGateway for MockDecisions {
        async fn will_create_payment(
            &self,
            _payment_method_data: CheckoutPaymentMethodData,
        ) -> PaymentCreationDecision {
            self.will_create_calls.fetch_add(1, Ordering::SeqCst);
            self.creation.clone()
        }

        async fn did_tokenize(&self, _token: &PaymentMethodToken) -> ResumeDecision {
            self.did_tokenize_calls.fetch_add(1, Ordering::SeqCst);
            self.tokenize.clone()
        }

        async fn did_resume(&self, _resume_token: &str) -> ResumeDecision {
            self.did_resume_calls.fetch_add(1, Ordering::SeqCst);
            self.resume.clone()
        }

        async fn did_enter_resume_pending(
            &self,
            additional_info: Option<CheckoutAdditionalInfo>,
        ) {
            self.resume_pending.lock().unwrap().push(additional_info);
        }
    }

    struct MockChallenge;

    #[async_trait]
    impl ChallengeHandler for MockChallenge {
        async fn perform_challenge(&self, _token: &PaymentMethodToken) -> CheckoutResult<String> {
            Ok("RESUME3DS".to_string())
        }
    }

    struct IdleOverlay {
        // Kept alive so the controller's event stream stays open.
        events_tx: StdMutex<Option<mpsc::Sender<OverlayEvent>>>,
        shown: AtomicU32,
    }

    impl IdleOverlay {
        fn new() -> Self {
            IdleOverlay {
                events_tx: StdMutex::new(None),
                shown: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WebOverlay for IdleOverlay {
        fn is_ready(&self) -> bool {
            true
        }

        async fn prepare(&self) -> CheckoutResult<()> {
            Ok(())
        }

        async fn show(&self, _url: &Url) -> CheckoutResult<mpsc::Receiver<OverlayEvent>> {
            self.shown.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(8);
            *self.events_tx.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn dismiss(&self) {}
    }

    #[derive(Default)]
    struct RecordingSink {
        completed: StdMutex<Vec<CheckoutData>>,
        failed: StdMutex<Vec<(CheckoutError, Option<CheckoutData>)>>,
        tokenization_started: AtomicU32,
    }

    #[async_trait]
    impl CheckoutEventSink for RecordingSink {
        async fn tokenization_started(&self, _payment_method_type: PaymentMethodType) {
            self.tokenization_started.fetch_add(1, Ordering::SeqCst);
        }

        async fn checkout_completed(&self, data: CheckoutData) {
            self.completed.lock().unwrap().push(data);
        }

        async fn checkout_failed(&self, error: CheckoutError, data: Option<CheckoutData>) {
            self.failed.lock().unwrap().push((error, data));
        }
    }

    struct Harness {
        tokenization: Arc<MockTokenization>,
        payments: Arc<MockPayments>,
        status: Arc<MockStatus>,
        decisions: Arc<MockDecisions>,
        overlay: Arc<IdleOverlay>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn orchestrator(
            &self,
            session: SessionContext,
            method: PaymentMethodType,
        ) -> PaymentFlowOrchestrator {
            PaymentFlowOrchestrator::new(
                session,
                method,
                Collaborators {
                    tokenization: self.tokenization.clone(),
                    payments: self.payments.clone(),
                    status: self.status.clone(),
                    decisions: self.decisions.clone(),
                    challenge: Arc::new(MockChallenge),
                    overlay: self.overlay.clone(),
                    events: self.sink.clone(),
                },
                OrchestratorOptions {
                    poll_interval: Duration::from_millis(1),
                    decision_timeout: Duration::from_secs(5),
                },
            )
        }
    }

    fn harness(payments: MockPayments, decisions: MockDecisions) -> Harness {
        Harness {
            tokenization: Arc::new(MockTokenization::default()),
            payments: Arc::new(payments),
            status: Arc::new(MockStatus {
                completes_after: 2,
                calls: AtomicU32::new(0),
            }),
            decisions: Arc::new(decisions),
            overlay: Arc::new(IdleOverlay::new()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn settled_response(id: &str) -> PaymentResponse {
        PaymentResponse {
            id: Some(id.to_string()),
            order_id: Some("order_1".to_string()),
            amount: Some(1000),
            currency_code: Some("EUR".to_string()),
            status: PaymentStatus::Settled,
            payment_failure_reason: None,
            required_action: None,
        }
    }

    fn pending_with_action(id: &str, intent: serde_json::Value) -> PaymentResponse {
        PaymentResponse {
            id: Some(id.to_string()),
            order_id: None,
            amount: None,
            currency_code: None,
            status: PaymentStatus::Pending,
            payment_failure_reason: None,
            required_action: Some(RequiredAction {
                name: intent["intent"].as_str().unwrap_or_default().to_string(),
                client_token: encode_token(intent),
                description: None,
            }),
        }
    }

    #[tokio::test]
    async fn auto_flow_without_required_action_completes_with_payment_id() {
        let h = harness(
            MockPayments::new(Some(Ok(settled_response("pay_1"))), None),
            MockDecisions::auto_defaults(),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let data = orchestrator.submit(card_data()).await.unwrap();
        assert_eq!(data.payment.id.as_deref(), Some("pay_1"));

        assert_eq!(h.sink.completed.lock().unwrap().len(), 1);
        assert!(h.sink.failed.lock().unwrap().is_empty());
        // Auto mode never consults the host.
        assert_eq!(h.decisions.will_create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.decisions.did_tokenize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn processor_redirect_polls_resumes_and_replaces_checkout_data() {
        let action = serde_json::json!({
            "intent": "PROCESSOR_3DS",
            "redirectUrl": "https://acquirer.example.com/challenge",
            "statusUrl": "https://gateway.example.com/status/abc",
        });
        let h = harness(
            MockPayments::new(
                Some(Ok(pending_with_action("pay_1", action))),
                Some(Ok(settled_response("pay_1"))),
            ),
            MockDecisions::auto_defaults(),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let data = orchestrator.submit(card_data()).await.unwrap();
        assert_eq!(data.payment.id.as_deref(), Some("pay_1"));

        assert_eq!(h.overlay.shown.load(Ordering::SeqCst), 1);
        let resumed = h.payments.resumed_with.lock().unwrap().clone().unwrap();
        assert_eq!(resumed, ("pay_1".to_string(), "RESUME123".to_string()));
        assert_eq!(h.sink.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redirect_action_without_status_url_fails_before_polling() {
        let action = serde_json::json!({
            "intent": "ADYEN_IDEAL_REDIRECTION",
            "redirectUrl": "https://acquirer.example.com/challenge",
        });
        let h = harness(
            MockPayments::new(Some(Ok(pending_with_action("pay_1", action))), None),
            MockDecisions::auto_defaults(),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        assert!(matches!(error, CheckoutError::InvalidClientToken { .. }));
        assert_eq!(h.status.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.overlay.shown.load(Ordering::SeqCst), 0);

        // Failure still carries the payment id learned at creation.
        let failed = h.sink.failed.lock().unwrap();
        let (_, data) = failed.first().unwrap();
        assert_eq!(
            data.as_ref().unwrap().payment.id.as_deref(),
            Some("pay_1")
        );
    }

    #[tokio::test]
    async fn manual_abort_stops_before_tokenization() {
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                PaymentCreationDecision::Abort(Some("no thanks".to_string())),
                ResumeDecision::Succeed,
                ResumeDecision::Succeed,
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        match error {
            CheckoutError::MerchantError { message, .. } => assert_eq!(message, "no thanks"),
            other => panic!("expected merchant error, got {other:?}"),
        }

        assert_eq!(h.tokenization.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.payments.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.tokenization_started.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.failed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vault_intent_skips_the_pre_creation_checkpoint() {
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                // Would abort if consulted.
                PaymentCreationDecision::Abort(None),
                ResumeDecision::Succeed,
                ResumeDecision::Succeed,
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Vault),
            PaymentMethodType::PaymentCard,
        );

        orchestrator.submit(card_data()).await.unwrap();
        assert_eq!(h.decisions.will_create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.tokenization.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_succeed_decision_still_fires_a_terminal_completion() {
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                PaymentCreationDecision::Continue,
                ResumeDecision::Succeed,
                ResumeDecision::Succeed,
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let data = orchestrator.submit(card_data()).await.unwrap();
        assert!(data.payment.id.is_none());
        assert_eq!(h.sink.completed.lock().unwrap().len(), 1);
        assert!(h.sink.failed.lock().unwrap().is_empty());
        assert_eq!(h.payments.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn manual_continue_with_new_token_runs_the_challenge_and_resumes() {
        let continuation = encode_token(serde_json::json!({
            "intent": "3DS_AUTHENTICATION",
        }));
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                PaymentCreationDecision::Continue,
                ResumeDecision::ContinueWithNewToken(continuation),
                ResumeDecision::Succeed,
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        orchestrator.submit(card_data()).await.unwrap();
        assert_eq!(h.decisions.did_resume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn host_fail_at_did_tokenize_surfaces_the_message_as_a_merchant_error() {
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                PaymentCreationDecision::Continue,
                ResumeDecision::Fail(Some("card not accepted".to_string())),
                ResumeDecision::Succeed,
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        match error {
            CheckoutError::MerchantError { message, .. } => {
                assert_eq!(message, "card not accepted")
            }
            other => panic!("expected merchant error, got {other:?}"),
        }

        // Tokenization happened, but nothing touched the gateway after the
        // host failed the checkpoint.
        assert_eq!(h.tokenization.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.payments.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.payments.resume_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.failed.lock().unwrap().len(), 1);
        assert!(h.sink.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn host_fail_at_did_resume_surfaces_the_message_as_a_merchant_error() {
        let continuation = encode_token(serde_json::json!({
            "intent": "3DS_AUTHENTICATION",
        }));
        let h = harness(
            MockPayments::new(None, None),
            MockDecisions::new(
                PaymentCreationDecision::Continue,
                ResumeDecision::ContinueWithNewToken(continuation),
                ResumeDecision::Fail(Some("resume rejected".to_string())),
            ),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Manual, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        match error {
            CheckoutError::MerchantError { message, .. } => {
                assert_eq!(message, "resume rejected")
            }
            other => panic!("expected merchant error, got {other:?}"),
        }

        assert_eq!(h.decisions.did_resume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.payments.resume_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.failed.lock().unwrap().len(), 1);
        assert!(h.sink.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_required_action_intent_is_an_invalid_resume_token() {
        let action = serde_json::json!({ "intent": "SOMETHING_UNKNOWN" });
        let h = harness(
            MockPayments::new(Some(Ok(pending_with_action("pay_1", action))), None),
            MockDecisions::auto_defaults(),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        match error {
            CheckoutError::InvalidValue { key, .. } => assert_eq!(key, "resumeToken"),
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_payment_record_fails_the_attempt() {
        let mut response = settled_response("pay_1");
        response.status = PaymentStatus::Failed;
        let h = harness(
            MockPayments::new(Some(Ok(response)), None),
            MockDecisions::auto_defaults(),
        );
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let error = orchestrator.submit(card_data()).await.unwrap_err();
        assert!(matches!(error, CheckoutError::FailedToProcessPayment { .. }));
    }

    #[tokio::test]
    async fn invalid_raw_data_reports_every_field_error() {
        let h = harness(MockPayments::new(None, None), MockDecisions::auto_defaults());
        let orchestrator = h.orchestrator(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
        );

        let bad = PaymentData::Card(CardData {
            card_number: "1234".to_string(),
            expiry_date: "13/1999".to_string(),
            cvv: "1".to_string(),
            cardholder_name: None,
        });
        let error = orchestrator.submit(bad).await.unwrap_err();
        match error {
            CheckoutError::Underlying { errors, .. } => assert!(errors.len() >= 3),
            other => panic!("expected aggregated validation errors, got {other:?}"),
        }
        assert_eq!(h.tokenization.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected_without_terminal_events() {
        struct SlowTokenization;

        #[async_trait]
        impl TokenizationClient for SlowTokenization {
            async fn tokenize(
                &self,
                _request: &TokenizationRequest,
            ) -> CheckoutResult<PaymentMethodToken> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(PaymentMethodToken {
                    token: "tok_1".to_string(),
                    payment_method_type: PaymentMethodType::PaymentCard,
                    analytics_id: None,
                    payment_instrument_data: None,
                })
            }
        }

        let h = harness(
            MockPayments::new(Some(Ok(settled_response("pay_1"))), None),
            MockDecisions::auto_defaults(),
        );
        let sink = h.sink.clone();
        let orchestrator = Arc::new(PaymentFlowOrchestrator::new(
            session(PaymentHandling::Auto, SessionIntent::Checkout),
            PaymentMethodType::PaymentCard,
            Collaborators {
                tokenization: Arc::new(SlowTokenization),
                payments: h.payments.clone(),
                status: h.status.clone(),
                decisions: h.decisions.clone(),
                challenge: Arc::new(MockChallenge),
                overlay: h.overlay.clone(),
                events: sink.clone(),
            },
            OrchestratorOptions::default(),
        ));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit(card_data()).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = orchestrator.submit(card_data()).await;
        assert!(matches!(second, Err(CheckoutError::PaymentFailed { .. })));

        first.await.unwrap().unwrap();
        // Only the accepted submission produced a terminal event.
        assert_eq!(sink.completed.lock().unwrap().len(), 1);
        assert!(sink.failed.lock().unwrap().is_empty());
    }
}
