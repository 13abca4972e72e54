use crate::error::{CheckoutError, CheckoutResult, ValidationError};
use crate::gateway::tokenization::TokenizationRequest;
use crate::methods::{InputElementType, PaymentData, TokenizationBuilder};
use crate::types::PaymentMethodType;

/// A previously vaulted payment method being exchanged for a fresh
/// single-use token, optionally re-confirmed with its CVV.
#[derive(Debug, Clone)]
pub struct VaultedData {
    pub vaulted_token_id: String,
    pub cvv: Option<String>,
}

pub struct VaultedMethodBuilder;

impl VaultedMethodBuilder {
    pub fn new() -> Self {
        VaultedMethodBuilder
    }
}

impl Default for VaultedMethodBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizationBuilder for VaultedMethodBuilder {
    fn payment_method_type(&self) -> PaymentMethodType {
        PaymentMethodType::VaultedCard
    }

    fn required_input_elements(&self) -> &'static [InputElementType] {
        &[]
    }

    fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>> {
        let PaymentData::Vaulted(vaulted) = data else {
            return Err(vec![ValidationError::InvalidRawData {
                message: "Expected vaulted payment method data.".to_string(),
            }]);
        };

        let mut errors = Vec::new();
        if vaulted.vaulted_token_id.trim().is_empty() {
            errors.push(ValidationError::InvalidRawData {
                message: "Vaulted payment method id cannot be blank.".to_string(),
            });
        }
        if let Some(cvv) = &vaulted.cvv {
            if cvv.is_empty() || !cvv.chars().all(|c| c.is_ascii_digit()) {
                errors.push(ValidationError::InvalidCvv {
                    message: "CVV is not valid.".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn build_request_body(&self, data: &PaymentData) -> CheckoutResult<TokenizationRequest> {
        let PaymentData::Vaulted(vaulted) = data else {
            return Err(CheckoutError::invalid_value(
                "payment_data",
                "expected vaulted payment method data",
            ));
        };

        Ok(TokenizationRequest {
            payment_instrument: serde_json::json!({
                "vaultedPaymentMethodId": vaulted.vaulted_token_id,
                "cvv": vaulted.cvv,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_vaulted_method_with_and_without_cvv() {
        let builder = VaultedMethodBuilder::new();
        let with_cvv = PaymentData::Vaulted(VaultedData {
            vaulted_token_id: "vault_1".to_string(),
            cvv: Some("123".to_string()),
        });
        let without_cvv = PaymentData::Vaulted(VaultedData {
            vaulted_token_id: "vault_1".to_string(),
            cvv: None,
        });
        assert!(builder.validate(&with_cvv).is_ok());
        assert!(builder.validate(&without_cvv).is_ok());
    }

    #[test]
    fn rejects_blank_id_and_malformed_cvv() {
        let builder = VaultedMethodBuilder::new();
        let data = PaymentData::Vaulted(VaultedData {
            vaulted_token_id: "".to_string(),
            cvv: Some("12x".to_string()),
        });
        let errors = builder.validate(&data).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
