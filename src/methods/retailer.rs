use crate::error::{CheckoutError, CheckoutResult, ValidationError};
use crate::gateway::tokenization::TokenizationRequest;
use crate::methods::{InputElementType, PaymentData, TokenizationBuilder};
use crate::types::{InitializationData, PaymentMethodType};

/// Selected retail outlet for voucher-style payment methods.
#[derive(Debug, Clone)]
pub struct RetailerData {
    pub retailer_id: String,
}

pub struct RetailerDataBuilder {
    initialization_data: Option<InitializationData>,
}

impl RetailerDataBuilder {
    pub fn new(initialization_data: Option<InitializationData>) -> Self {
        RetailerDataBuilder {
            initialization_data,
        }
    }

    /// Resolves the selected retailer's display name from the cached
    /// initialization data; used for voucher additional-info.
    pub fn retailer_name(&self, retailer_id: &str) -> Option<String> {
        self.initialization_data
            .as_ref()
            .and_then(|data| data.retailer_name(retailer_id))
            .map(String::from)
    }
}

impl TokenizationBuilder for RetailerDataBuilder {
    fn payment_method_type(&self) -> PaymentMethodType {
        PaymentMethodType::RetailOutlet
    }

    fn required_input_elements(&self) -> &'static [InputElementType] {
        &[InputElementType::Retailer]
    }

    fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>> {
        let PaymentData::Retailer(retailer) = data else {
            return Err(vec![ValidationError::InvalidRawData {
                message: "Expected retailer data.".to_string(),
            }]);
        };

        let mut errors = Vec::new();
        if retailer.retailer_id.trim().is_empty() {
            errors.push(ValidationError::InvalidRetailer {
                message: "Retailer must be selected.".to_string(),
            });
        } else if self.retailer_name(&retailer.retailer_id).is_none() {
            errors.push(ValidationError::InvalidRetailer {
                message: "Invalid retailer identifier.".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn build_request_body(&self, data: &PaymentData) -> CheckoutResult<TokenizationRequest> {
        let PaymentData::Retailer(retailer) = data else {
            return Err(CheckoutError::invalid_value(
                "payment_data",
                "expected retailer data",
            ));
        };

        Ok(TokenizationRequest {
            payment_instrument: serde_json::json!({
                "retailOutlet": retailer.retailer_id,
            }),
        })
    }
}
