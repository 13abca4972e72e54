//! Raw payment data ownership and validation coalescing.
//!
//! Validation may be requested faster than it completes (every keystroke).
//! The required behavior: at most one validation executes at a time, and
//! when requests arrive mid-validation only the latest is kept — it runs
//! once the in-flight validation finishes; every superseded request is
//! dropped, never queued. Stale data is never validated.

use crate::error::ValidationError;
use crate::methods::{PaymentData, TokenizationBuilder};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Validation seam; the default implementation delegates to the method
/// strategy's aggregated validator.
#[async_trait]
pub trait RawDataValidator: Send + Sync {
    async fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>>;
}

pub struct BuilderValidator {
    builder: Arc<dyn TokenizationBuilder>,
}

impl BuilderValidator {
    pub fn new(builder: Arc<dyn TokenizationBuilder>) -> Self {
        BuilderValidator { builder }
    }
}

#[async_trait]
impl RawDataValidator for BuilderValidator {
    async fn validate(&self, data: &PaymentData) -> Result<(), Vec<ValidationError>> {
        self.builder.validate(data)
    }
}

/// Receives validation verdicts as the user edits payment data.
#[async_trait]
pub trait RawDataObserver: Send + Sync {
    /// Fired when new raw data is stored, before it is validated.
    async fn metadata_did_change(&self) {}

    async fn data_is_valid(&self, is_valid: bool, errors: Vec<ValidationError>);
}

#[derive(Default)]
struct CoalesceState {
    running: bool,
    pending: Option<PaymentData>,
}

pub struct RawDataManager {
    validator: Arc<dyn RawDataValidator>,
    observer: Arc<dyn RawDataObserver>,
    state: Mutex<CoalesceState>,
    latest: Mutex<Option<PaymentData>>,
    is_data_valid: AtomicBool,
}

impl RawDataManager {
    pub fn new(validator: Arc<dyn RawDataValidator>, observer: Arc<dyn RawDataObserver>) -> Self {
        RawDataManager {
            validator,
            observer,
            state: Mutex::new(CoalesceState::default()),
            latest: Mutex::new(None),
            is_data_valid: AtomicBool::new(false),
        }
    }

    /// Stores new payment data and validates it. When a validation is
    /// already running this marks the data pending and returns immediately;
    /// the running validation will pick the latest pending value up.
    pub async fn set_raw_data(&self, data: PaymentData) {
        *self.latest.lock().await = Some(data.clone());
        self.observer.metadata_did_change().await;

        {
            let mut state = self.state.lock().await;
            if state.running {
                // Latest wins; any previously pending value is dropped.
                debug!("validation in flight, coalescing request");
                state.pending = Some(data);
                return;
            }
            state.running = true;
        }

        let mut current = data;
        loop {
            let result = self.validator.validate(&current).await;
            let is_valid = result.is_ok();
            self.is_data_valid.store(is_valid, Ordering::SeqCst);
            self.observer
                .data_is_valid(is_valid, result.err().unwrap_or_default())
                .await;

            let mut state = self.state.lock().await;
            match state.pending.take() {
                Some(next) => current = next,
                None => {
                    state.running = false;
                    break;
                }
            }
        }
    }

    pub fn is_data_valid(&self) -> bool {
        self.is_data_valid.load(Ordering::SeqCst)
    }

    pub async fn raw_data(&self) -> Option<PaymentData> {
        self.latest.lock().await.clone()
    }
}
