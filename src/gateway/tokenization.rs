use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::http::GatewayHttpClient;
use crate::session::SessionContext;
use crate::types::PaymentMethodToken;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Gateway-specific request payload produced by a method strategy from
/// collected payment data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizationRequest {
    pub payment_instrument: JsonValue,
}

/// Exchanges sensitive payment data for an opaque payment-method token.
#[async_trait]
pub trait TokenizationClient: Send + Sync {
    async fn tokenize(&self, request: &TokenizationRequest) -> CheckoutResult<PaymentMethodToken>;
}

pub struct HttpTokenizationClient {
    http: GatewayHttpClient,
    pci_url: Url,
    access_token: String,
}

impl HttpTokenizationClient {
    pub fn new(session: &SessionContext) -> CheckoutResult<Self> {
        let pci_url = session
            .pci_url()
            .cloned()
            .ok_or_else(CheckoutError::invalid_client_token)?;

        Ok(Self {
            http: GatewayHttpClient::new(Duration::from_secs(30), 2)?,
            pci_url,
            access_token: session.access_token().to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/payment-instruments",
            self.pci_url.as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TokenizationClient for HttpTokenizationClient {
    async fn tokenize(&self, request: &TokenizationRequest) -> CheckoutResult<PaymentMethodToken> {
        let body = serde_json::to_value(request)
            .map_err(|e| CheckoutError::invalid_value("tokenization_request", e.to_string()))?;

        let token: PaymentMethodToken = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(),
                Some(&self.access_token),
                Some(&body),
            )
            .await?;

        info!(
            payment_method_type = %token.payment_method_type,
            "payment data tokenized"
        );

        Ok(token)
    }
}
