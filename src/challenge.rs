//! 3-D Secure challenge seam.

use crate::error::CheckoutResult;
use crate::types::PaymentMethodToken;
use async_trait::async_trait;

/// Performs a device-local or provider-assisted authentication challenge
/// for the tokenized payment method and yields a resume token.
///
/// Failures are wrapped by the orchestrator and attributed to the
/// originating payment method type.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn perform_challenge(&self, token: &PaymentMethodToken) -> CheckoutResult<String>;
}
