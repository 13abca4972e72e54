//! Explicit session context.
//!
//! Everything the orchestrator needs from SDK initialization travels in a
//! [`SessionContext`] passed to its constructor. No global state is read
//! during a submission attempt.

use crate::error::{CheckoutError, CheckoutResult};
use crate::token::DecodedContinuationToken;
use crate::types::InitializationData;
use url::Url;

/// Who drives the flow after tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentHandling {
    /// The SDK completes the entire flow without host intervention.
    Auto,
    /// The host application decides how to proceed at the two decision
    /// checkpoints.
    Manual,
}

/// Whether the submission pays now or saves the method for later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    Checkout,
    Vault,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    payment_handling: PaymentHandling,
    intent: SessionIntent,
    client_token: String,
    decoded: DecodedContinuationToken,
    initialization_data: Option<InitializationData>,
}

impl SessionContext {
    /// Decodes and validates the client token up front so a malformed
    /// session fails at construction rather than mid-flow.
    pub fn new(
        client_token: impl Into<String>,
        payment_handling: PaymentHandling,
        intent: SessionIntent,
    ) -> CheckoutResult<Self> {
        let client_token = client_token.into();
        let decoded = DecodedContinuationToken::decode(&client_token)?;
        if decoded.access_token.is_none() {
            return Err(CheckoutError::invalid_client_token());
        }

        Ok(SessionContext {
            payment_handling,
            intent,
            client_token,
            decoded,
            initialization_data: None,
        })
    }

    pub fn with_initialization_data(mut self, data: InitializationData) -> Self {
        self.initialization_data = Some(data);
        self
    }

    pub fn payment_handling(&self) -> PaymentHandling {
        self.payment_handling
    }

    pub fn intent(&self) -> SessionIntent {
        self.intent
    }

    pub fn client_token(&self) -> &str {
        &self.client_token
    }

    pub fn decoded_token(&self) -> &DecodedContinuationToken {
        &self.decoded
    }

    pub fn access_token(&self) -> &str {
        // Presence checked in `new`.
        self.decoded.access_token.as_deref().unwrap_or_default()
    }

    pub fn core_url(&self) -> Option<&Url> {
        self.decoded.core_url.as_ref()
    }

    pub fn pci_url(&self) -> Option<&Url> {
        self.decoded.pci_url.as_ref()
    }

    pub fn initialization_data(&self) -> Option<&InitializationData> {
        self.initialization_data.as_ref()
    }
}
