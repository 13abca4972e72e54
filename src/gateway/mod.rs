//! Gateway clients: tokenization, payment create/resume, and status polling
//! transport. Each client is a trait so flows can run against mocks.

pub mod http;
pub mod payments;
pub mod tokenization;

pub use http::GatewayHttpClient;
pub use payments::{ensure_processable, CreateResumeClient, HttpCreateResumeClient, PaymentCallError};
pub use tokenization::{HttpTokenizationClient, TokenizationClient, TokenizationRequest};
