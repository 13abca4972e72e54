//! Continuation token decoding.
//!
//! The gateway hands the client an opaque JWT-style token after payment
//! creation or resume. The payload segment tells the client what to do
//! next: run a 3DS challenge, follow a redirect, poll a status endpoint,
//! or display voucher instructions.

use crate::error::{CheckoutError, CheckoutResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Intent discriminator parsed from a decoded continuation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredActionIntent {
    ThreeDsAuthentication,
    ProcessorThreeDs,
    /// Any gateway-specific intent ending in `_REDIRECTION`.
    Redirection,
    PaymentMethodVoucher,
    Checkout,
    Other(String),
}

impl RequiredActionIntent {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "3DS_AUTHENTICATION" => RequiredActionIntent::ThreeDsAuthentication,
            "PROCESSOR_3DS" => RequiredActionIntent::ProcessorThreeDs,
            "PAYMENT_METHOD_VOUCHER" => RequiredActionIntent::PaymentMethodVoucher,
            "CHECKOUT" => RequiredActionIntent::Checkout,
            other if other.ends_with("_REDIRECTION") => RequiredActionIntent::Redirection,
            other => RequiredActionIntent::Other(other.to_string()),
        }
    }
}

/// Decoded form of a client or continuation token.
///
/// `intent` drives the required-action branch; the URL and voucher fields
/// are intent-specific and may be absent. `access_token` and the service
/// URLs come from the initial client token and authenticate gateway calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedContinuationToken {
    pub intent: Option<String>,
    pub access_token: Option<String>,
    pub core_url: Option<Url>,
    pub pci_url: Option<Url>,
    pub redirect_url: Option<Url>,
    pub status_url: Option<Url>,
    /// Unix epoch seconds.
    pub expires_at: Option<i64>,
    pub reference: Option<String>,
}

impl DecodedContinuationToken {
    /// Decodes the payload segment of a JWT-style token. The signature is
    /// not verified here; the token is only inspected for routing.
    pub fn decode(raw: &str) -> CheckoutResult<Self> {
        let payload = raw
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(CheckoutError::invalid_client_token)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| CheckoutError::invalid_client_token())?;

        serde_json::from_slice(&bytes).map_err(|_| CheckoutError::invalid_client_token())
    }

    pub fn required_action_intent(&self) -> RequiredActionIntent {
        match self.intent.as_deref() {
            Some(raw) => RequiredActionIntent::parse(raw),
            None => RequiredActionIntent::Other(String::new()),
        }
    }

    pub fn expires_at_datetime(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}
