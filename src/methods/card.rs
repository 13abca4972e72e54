use crate::error::{CheckoutError, CheckoutResult, ValidationError};
use crate::gateway::tokenization::TokenizationRequest;
use crate::methods::{InputElementType, PaymentData, TokenizationBuilder};
use crate::types::PaymentMethodType;
use chrono::{Datelike, Utc};

#[derive(Debug, Clone)]
pub struct CardData {
    pub card_number: String,
    /// `MM/YY` or `MM/YYYY`.
    pub expiry_date: String,
    pub cvv: String,
    pub cardholder_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Unknown,
}

impl CardNetwork {
    fn detect(number: &str) -> Self {
        if number.starts_with('4') {
            CardNetwork::Visa
        } else if number.starts_with("34") || number.starts_with("37") {
            CardNetwork::Amex
        } else if number
            .get(0..2)
            .and_then(|p| p.parse::<u32>().ok())
            .is_some_and(|p| (51..=55).contains(&p))
            || number
                .get(0..4)
                .and_then(|p| p.parse::<u32>().ok())
                .is_some_and(|p| (2221..=2720).contains(&p))
        {
            CardNetwork::Mastercard
        } else {
            CardNetwork::Unknown
        }
    }

    fn cvv_length(&self) -> usize {
        match self {
            CardNetwork::Amex => 4,
            _ => 3,
        }
    }
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, ch) in digits.chars().rev().enumerate() {
        let Some(mut d) = ch.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// Parses `MM/YY` or `MM/YYYY` into (month, four-digit year).
fn parse_expiry(raw: &str) -> Option<(u32, i32)> {
    let (month_part, year_part) = raw.split_once('/')?;
    let month: u32 = month_part.trim().parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let year_part = year_part.trim();
    let year: i32 = match year_part.len() {
        2 => 2000 + year_part.parse::<i32>().ok()?,
        4 => year_part.parse().ok()?,
        _ => return None,
    };
    Some((month, year))
}

pub struct CardDataBuilder;

impl CardDataBuilder {
    pub fn new() -> Self {
        CardDataBuilder
    }
}

impl Default for CardDataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizationBuilder for CardDataBuilder {
    fn payment_method_type(&self) -> PaymentMethodType {
        PaymentMethodType::PaymentCard
    }

    fn required_input_elements(&self) -> &'static [InputElementType] {
        &[
            InputElementType::CardNumber,
            InputElementType::ExpiryDate,
            InputElementType::Cvv,
            InputElementType::CardholderName,
        ]
    }

    fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>> {
        let PaymentData::Card(card) = data else {
            return Err(vec![ValidationError::InvalidRawData {
                message: "Expected card data.".to_string(),
            }]);
        };

        let mut errors = Vec::new();
        let digits: String = card.card_number.chars().filter(|c| !c.is_whitespace()).collect();

        if digits.is_empty() {
            errors.push(ValidationError::InvalidCardNumber {
                message: "Card number can not be blank.".to_string(),
            });
        } else if digits.len() < 13 || digits.len() > 19 || !luhn_valid(&digits) {
            errors.push(ValidationError::InvalidCardNumber {
                message: "Card number is not valid.".to_string(),
            });
        }

        match parse_expiry(&card.expiry_date) {
            None => errors.push(ValidationError::InvalidExpiryDate {
                message: "Expiry date is not valid.".to_string(),
            }),
            Some((month, year)) => {
                let now = Utc::now();
                if year < now.year() || (year == now.year() && month < now.month()) {
                    errors.push(ValidationError::InvalidExpiryDate {
                        message: "Card has expired.".to_string(),
                    });
                }
            }
        }

        let network = CardNetwork::detect(&digits);
        if card.cvv.is_empty() {
            errors.push(ValidationError::InvalidCvv {
                message: "CVV cannot be blank.".to_string(),
            });
        } else if card.cvv.len() != network.cvv_length()
            || !card.cvv.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(ValidationError::InvalidCvv {
                message: "CVV is not valid.".to_string(),
            });
        }

        if let Some(name) = &card.cardholder_name {
            if name.trim().is_empty() {
                errors.push(ValidationError::InvalidCardholderName {
                    message: "Cardholder name cannot be blank.".to_string(),
                });
            } else if name.chars().any(|c| c.is_ascii_digit()) {
                errors.push(ValidationError::InvalidCardholderName {
                    message: "Cardholder name is not valid.".to_string(),
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
        let PaymentData::Card(card) = data else {
            return Err(CheckoutError::invalid_value(
                "payment_data",
                "expected card data",
            ));
        };

        let (month, year) = parse_expiry(&card.expiry_date)
            .ok_or_else(|| CheckoutError::invalid_value("expiry_date", "unparseable expiry"))?;
        let digits: String = card.card_number.chars().filter(|c| !c.is_whitespace()).collect();

        Ok(TokenizationRequest {
            payment_instrument: serde_json::json!({
                "number": digits,
                "cvv": card.cvv,
                "expirationMonth": format!("{month:02}"),
                "expirationYear": year.to_string(),
                "cardholderName": card.cardholder_name.as_deref().filter(|n| !n.is_empty()),
            }),
        })
    }
}
