//! Unified error model for the checkout flow.
//!
//! Every terminal failure reaching the caller is a [`CheckoutError`]; field
//! level problems found while validating raw payment data are collected as
//! [`ValidationError`]s and reported together through
//! [`CheckoutError::Underlying`] so the caller sees every problem at once.

use thiserror::Error;
use uuid::Uuid;

pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// The client or continuation token is missing, malformed, or lacks the
    /// fields the current flow step requires.
    #[error("Invalid client token [diagnostics id: {diagnostics_id}]")]
    InvalidClientToken { diagnostics_id: String },

    #[error("Unsupported payment method: {payment_method_type}")]
    UnsupportedPaymentMethod {
        payment_method_type: String,
        diagnostics_id: String,
    },

    /// A value required by the current step is missing or unusable.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        key: String,
        message: String,
        diagnostics_id: String,
    },

    /// The host application aborted or failed the flow at a decision
    /// checkpoint, optionally with its own message.
    #[error("Merchant error: {message}")]
    MerchantError {
        message: String,
        diagnostics_id: String,
    },

    /// The gateway did not produce a usable payment record.
    #[error("Payment failed: {description}")]
    PaymentFailed {
        description: String,
        diagnostics_id: String,
    },

    /// The gateway produced a payment record in a state the flow cannot
    /// continue from. Distinct from a transport failure.
    #[error("Payment {payment_id} cannot be processed, status: {status}")]
    FailedToProcessPayment {
        payment_id: String,
        status: String,
        diagnostics_id: String,
    },

    /// The 3-D Secure challenge failed, attributed to the originating
    /// payment method.
    #[error("3DS challenge failed for {payment_method_type}: {message}")]
    ThreeDsFailed {
        payment_method_type: String,
        message: String,
        diagnostics_id: String,
    },

    /// The user dismissed the redirect overlay before the flow settled.
    #[error("Payment cancelled for {payment_method_type}")]
    Cancelled {
        payment_method_type: String,
        diagnostics_id: String,
    },

    /// Aggregated raw-data validation failures.
    #[error("Raw data validation failed with {} error(s)", .errors.len())]
    Underlying {
        errors: Vec<ValidationError>,
        diagnostics_id: String,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        diagnostics_id: String,
    },

    #[error("Gateway error: HTTP {status_code}: {message}")]
    Gateway {
        status_code: u16,
        message: String,
        diagnostics_id: String,
    },
}

fn diagnostics_id() -> String {
    Uuid::new_v4().to_string()
}

impl CheckoutError {
    pub fn invalid_client_token() -> Self {
        CheckoutError::InvalidClientToken {
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn unsupported_payment_method(payment_method_type: impl Into<String>) -> Self {
        CheckoutError::UnsupportedPaymentMethod {
            payment_method_type: payment_method_type.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::InvalidValue {
            key: key.into(),
            message: message.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    /// `None` means the host failed the checkpoint without a message.
    pub fn merchant_error(message: Option<String>) -> Self {
        CheckoutError::MerchantError {
            message: message.unwrap_or_default(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn payment_failed(description: impl Into<String>) -> Self {
        CheckoutError::PaymentFailed {
            description: description.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn failed_to_process_payment(
        payment_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        CheckoutError::FailedToProcessPayment {
            payment_id: payment_id.into(),
            status: status.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn three_ds_failed(
        payment_method_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CheckoutError::ThreeDsFailed {
            payment_method_type: payment_method_type.into(),
            message: message.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn cancelled(payment_method_type: impl Into<String>) -> Self {
        CheckoutError::Cancelled {
            payment_method_type: payment_method_type.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn underlying(errors: Vec<ValidationError>) -> Self {
        CheckoutError::Underlying {
            errors,
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        CheckoutError::Network {
            message: message.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn gateway(status_code: u16, message: impl Into<String>) -> Self {
        CheckoutError::Gateway {
            status_code,
            message: message.into(),
            diagnostics_id: diagnostics_id(),
        }
    }

    pub fn diagnostics_id(&self) -> &str {
        match self {
            CheckoutError::InvalidClientToken { diagnostics_id }
            | CheckoutError::UnsupportedPaymentMethod { diagnostics_id, .. }
            | CheckoutError::InvalidValue { diagnostics_id, .. }
            | CheckoutError::MerchantError { diagnostics_id, .. }
            | CheckoutError::PaymentFailed { diagnostics_id, .. }
            | CheckoutError::FailedToProcessPayment { diagnostics_id, .. }
            | CheckoutError::ThreeDsFailed { diagnostics_id, .. }
            | CheckoutError::Cancelled { diagnostics_id, .. }
            | CheckoutError::Underlying { diagnostics_id, .. }
            | CheckoutError::Network { diagnostics_id, .. }
            | CheckoutError::Gateway { diagnostics_id, .. } => diagnostics_id,
        }
    }

    /// Transport-level failures may be worth retrying; everything else is a
    /// terminal verdict for the current attempt.
    pub fn is_network_error(&self) -> bool {
        matches!(self, CheckoutError::Network { .. })
    }
}

/// Field-level failures found while validating collected payment data.
///
/// These are always collected in full before being reported, never
/// short-circuited on the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{message}")]
    InvalidCardNumber { message: String },

    #[error("{message}")]
    InvalidExpiryDate { message: String },

    #[error("{message}")]
    InvalidCvv { message: String },

    #[error("{message}")]
    InvalidCardholderName { message: String },

    #[error("{message}")]
    InvalidRetailer { message: String },

    #[error("{message}")]
    InvalidRawData { message: String },
}
