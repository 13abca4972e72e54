//! Per-payment-method strategies.
//!
//! The orchestrator is method-agnostic; everything payment-method-specific
//! — which inputs are required, how raw data is validated, and how the
//! tokenization request body is built — lives behind
//! [`TokenizationBuilder`].

pub mod card;
pub mod retailer;
pub mod vaulted;

use crate::error::{CheckoutResult, ValidationError};
use crate::gateway::tokenization::TokenizationRequest;
use crate::session::SessionContext;
use crate::types::PaymentMethodType;
use std::sync::Arc;

pub use card::CardData;
pub use retailer::RetailerData;
pub use vaulted::VaultedData;

/// Collected, payment-method-specific input. Owned by the caller and
/// read-only to the flow.
#[derive(Debug, Clone)]
pub enum PaymentData {
    Card(CardData),
    Retailer(RetailerData),
    Vaulted(VaultedData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputElementType {
    CardNumber,
    ExpiryDate,
    Cvv,
    CardholderName,
    Retailer,
}

pub trait TokenizationBuilder: Send + Sync {
    fn payment_method_type(&self) -> PaymentMethodType;

    fn required_input_elements(&self) -> &'static [InputElementType];

    /// Validates collected data, returning every failure at once rather
    /// than stopping at the first.
    fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>>;

    fn build_request_body(&self, data: &PaymentData) -> CheckoutResult<TokenizationRequest>;
}

/// Strategy lookup. Unsupported payment method types fail here, before any
/// pipeline work happens.
pub fn builder_for(
    payment_method_type: PaymentMethodType,
    session: &SessionContext,
) -> Arc<dyn TokenizationBuilder> {
    match payment_method_type {
        PaymentMethodType::PaymentCard => Arc::new(card::CardDataBuilder::new()),
        PaymentMethodType::RetailOutlet => Arc::new(retailer::RetailerDataBuilder::new(
            session.initialization_data().cloned(),
        )),
        PaymentMethodType::VaultedCard => Arc::new(vaulted::VaultedMethodBuilder::new()),
    }
}
