use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::http::GatewayHttpClient;
use crate::session::SessionContext;
use crate::types::{PaymentResponse, PaymentStatus};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;
use url::Url;

/// A create/resume failure, possibly carrying the partial payment record
/// the gateway returned alongside the error. Known payment identifiers are
/// never discarded on failure.
#[derive(Debug)]
pub struct PaymentCallError {
    pub error: CheckoutError,
    pub partial_response: Option<PaymentResponse>,
}

impl PaymentCallError {
    pub fn transport(error: CheckoutError) -> Self {
        PaymentCallError {
            error,
            partial_response: None,
        }
    }
}

/// Creates a payment from a payment-method token, or resumes a pending
/// payment with a resume token.
#[async_trait]
pub trait CreateResumeClient: Send + Sync {
    async fn create_payment(&self, token: &str) -> Result<PaymentResponse, PaymentCallError>;

    async fn resume_payment(
        &self,
        payment_id: &str,
        resume_token: &str,
    ) -> Result<PaymentResponse, PaymentCallError>;
}

/// Rejects payment records the flow cannot continue from: a missing id or
/// a gateway-reported FAILED status. Both are domain failures, distinct
/// from transport errors.
pub fn ensure_processable(
    response: PaymentResponse,
    operation: &str,
) -> CheckoutResult<PaymentResponse> {
    let Some(payment_id) = response.id.as_deref() else {
        return Err(CheckoutError::payment_failed(format!(
            "Failed to {operation} payment"
        )));
    };

    if response.status == PaymentStatus::Failed {
        return Err(CheckoutError::failed_to_process_payment(
            payment_id,
            response.status.as_str(),
        ));
    }

    Ok(response)
}

pub struct HttpCreateResumeClient {
    http: GatewayHttpClient,
    core_url: Url,
    access_token: String,
}

impl HttpCreateResumeClient {
    pub fn new(session: &SessionContext) -> CheckoutResult<Self> {
        let core_url = session
            .core_url()
            .cloned()
            .ok_or_else(CheckoutError::invalid_client_token)?;

        Ok(Self {
            http: GatewayHttpClient::new(Duration::from_secs(30), 2)?,
            core_url,
            access_token: session.access_token().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.core_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CreateResumeClient for HttpCreateResumeClient {
    async fn create_payment(&self, token: &str) -> Result<PaymentResponse, PaymentCallError> {
        let body = serde_json::json!({ "paymentMethodToken": token });
        let response: PaymentResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payments"),
                Some(&self.access_token),
                Some(&body),
            )
            .await
            .map_err(PaymentCallError::transport)?;

        info!(
            payment_id = response.id.as_deref().unwrap_or("unknown"),
            status = response.status.as_str(),
            "payment created"
        );

        Ok(response)
    }

    async fn resume_payment(
        &self,
        payment_id: &str,
        resume_token: &str,
    ) -> Result<PaymentResponse, PaymentCallError> {
        let body = serde_json::json!({ "resumeToken": resume_token });
        let response: PaymentResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/payments/{payment_id}/resume")),
                Some(&self.access_token),
                Some(&body),
            )
            .await
            .map_err(PaymentCallError::transport)?;

        info!(
            payment_id,
            status = response.status.as_str(),
            "payment resumed"
        );

        Ok(response)
    }
}
