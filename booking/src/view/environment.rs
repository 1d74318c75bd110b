//! Injected dependencies of the booking view.

use crate::api::BookingApi;
use crate::config::{ConsoleConfig, ReconciliationConfig};
use crate::idempotency::{IdempotencyKey, IdempotencyKeyGenerator, MutationKind};
use staydesk_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Environment for [`BookingViewReducer`](super::BookingViewReducer).
///
/// Production wires `SystemClock` and `HttpBookingApi`; tests use a fixed or
/// manual clock and `ScriptedBookingApi`.
#[derive(Clone)]
pub struct BookingEnvironment {
    clock: Arc<dyn Clock>,
    api: Arc<dyn BookingApi>,
    idempotency: IdempotencyKeyGenerator,
    reconciliation: ReconciliationConfig,
}

impl BookingEnvironment {
    /// Environment with default idempotency window and polling settings.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, api: Arc<dyn BookingApi>) -> Self {
        Self {
            clock,
            api,
            idempotency: IdempotencyKeyGenerator::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }

    /// Environment using the windows and timings from `config`.
    #[must_use]
    pub fn from_config(config: &ConsoleConfig, clock: Arc<dyn Clock>, api: Arc<dyn BookingApi>) -> Self {
        Self::new(clock, api)
            .with_idempotency_window(config.idempotency.window)
            .with_reconciliation(config.reconciliation.clone())
    }

    /// Override polling settings.
    #[must_use]
    pub fn with_reconciliation(mut self, reconciliation: ReconciliationConfig) -> Self {
        self.reconciliation = reconciliation;
        self
    }

    /// Override the idempotency bucket width.
    #[must_use]
    pub fn with_idempotency_window(mut self, window: Duration) -> Self {
        self.idempotency = IdempotencyKeyGenerator::new(window);
        self
    }

    /// Clock for timestamps and elapsed-time checks.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Backend client.
    #[must_use]
    pub fn api(&self) -> Arc<dyn BookingApi> {
        Arc::clone(&self.api)
    }

    /// Polling settings.
    #[must_use]
    pub const fn reconciliation(&self) -> &ReconciliationConfig {
        &self.reconciliation
    }

    /// Idempotency key for a mutation at the current instant.
    #[must_use]
    pub fn idempotency_key(
        &self,
        resource_id: &str,
        action: MutationKind,
        amount_minor: i64,
    ) -> IdempotencyKey {
        self.idempotency
            .generate(resource_id, action, amount_minor, self.clock.now())
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("idempotency", &self.idempotency)
            .field("reconciliation", &self.reconciliation)
            .finish_non_exhaustive()
    }
}
