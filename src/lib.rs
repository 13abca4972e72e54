//! Checkout payment submission and resume flow.
//!
//! The crate takes collected payment data from validation through
//! tokenization, payment creation, required-action continuations (3DS
//! challenges, processor redirects, vouchers) and resume, to a single
//! terminal outcome. Hosts plug in at the trait seams: decision
//! checkpoints, the web overlay, the challenge handler, and the event sink.

pub mod challenge;
pub mod decisions;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod methods;
pub mod orchestrator;
pub mod polling;
pub mod rawdata;
pub mod redirect;
pub mod session;
pub mod token;
pub mod types;

// Re-export the flow surface hosts interact with
pub use crate::decisions::{DecisionGateway, PaymentCreationDecision, ResumeDecision};
pub use crate::error::{CheckoutError, CheckoutResult, ValidationError};
pub use crate::orchestrator::{
    CheckoutEventSink, Collaborators, OrchestratorOptions, PaymentFlowOrchestrator,
};
pub use crate::session::{PaymentHandling, SessionContext, SessionIntent};
pub use crate::types::{
    CheckoutAdditionalInfo, CheckoutData, PaymentMethodToken, PaymentMethodType,
};
