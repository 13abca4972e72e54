use crate::error::CheckoutError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodType {
    PaymentCard,
    RetailOutlet,
    VaultedCard,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::PaymentCard => "PAYMENT_CARD",
            PaymentMethodType::RetailOutlet => "RETAIL_OUTLET",
            PaymentMethodType::VaultedCard => "VAULTED_CARD",
        }
    }
}

impl std::fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethodType {
    type Err = CheckoutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "PAYMENT_CARD" => Ok(PaymentMethodType::PaymentCard),
            "RETAIL_OUTLET" => Ok(PaymentMethodType::RetailOutlet),
            "VAULTED_CARD" => Ok(PaymentMethodType::VaultedCard),
            other => Err(CheckoutError::unsupported_payment_method(other)),
        }
    }
}

/// Result of tokenizing collected payment data. Immutable once produced and
/// held for the duration of a single submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodToken {
    pub token: String,
    pub payment_method_type: PaymentMethodType,
    pub analytics_id: Option<String>,
    pub payment_instrument_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Settling,
    Settled,
    Declined,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Settling => "SETTLING",
            PaymentStatus::Settled => "SETTLED",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Gateway signal that the payment is not yet final. Carries a fresh
/// continuation token telling the client what to do next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredAction {
    pub name: String,
    pub client_token: String,
    pub description: Option<String>,
}

/// Payment record returned by the create and resume endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<i64>,
    pub currency_code: Option<String>,
    pub status: PaymentStatus,
    pub payment_failure_reason: Option<String>,
    pub required_action: Option<RequiredAction>,
}

/// Terminal payment result exposed to the caller. Built incrementally:
/// first from the create-payment response, later possibly replaced by the
/// resume-payment response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutData {
    pub payment: CheckoutDataPayment,
    pub additional_info: Option<CheckoutAdditionalInfo>,
}

impl CheckoutData {
    pub fn from_payment_response(response: &PaymentResponse) -> Self {
        CheckoutData {
            payment: CheckoutDataPayment {
                id: response.id.clone(),
                order_id: response.order_id.clone(),
                payment_failure_reason: response.payment_failure_reason.clone(),
            },
            additional_info: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDataPayment {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub payment_failure_reason: Option<String>,
}

/// Additional payload attached to the terminal result for informational
/// completion paths, e.g. voucher instructions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CheckoutAdditionalInfo {
    #[serde(rename_all = "camelCase")]
    Voucher {
        coupon_code: String,
        expires_at: String,
        retailer_name: String,
    },
}

/// What the host application sees at the pre-creation decision checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPaymentMethodData {
    pub payment_method_type: PaymentMethodType,
}

/// Per-method data fetched once at configure time and cached for the
/// lifetime of the session, e.g. the retail outlet list a voucher method
/// resolves its display name from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InitializationData {
    pub retail_outlets: Vec<RetailOutlet>,
}

impl InitializationData {
    pub fn retailer_name(&self, retailer_id: &str) -> Option<&str> {
        self.retail_outlets
            .iter()
            .find(|outlet| outlet.id == retailer_id)
            .map(|outlet| outlet.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailOutlet {
    pub id: String,
    pub name: String,
}
