//! The booking view controller handed to the rendering layer.

use super::{BookingAction, BookingEnvironment, BookingViewReducer, BookingViewState};
use crate::payment::{PaymentAction, RECONCILIATION_EFFECT};
use crate::types::BookingId;
use staydesk_core::effect::EffectId;
use staydesk_runtime::{EffectHandle, StoreConfig, StoreError, store::Store};
use std::time::Duration;
use tokio::sync::broadcast;

type BookingStore = Store<BookingViewState, BookingAction, BookingEnvironment, BookingViewReducer>;

/// Owns one booking view store.
///
/// The rendering layer sends commands, reads [`snapshot`](Self::snapshot)s
/// and listens to [`subscribe`](Self::subscribe). Dropping the controller
/// stops the reconciliation poller.
///
/// # Example
///
/// ```ignore
/// let controller = BookingViewController::new(environment);
/// controller.open(BookingId::new("bk_42")).await?;
/// let view = controller.snapshot().await;
/// ```
pub struct BookingViewController {
    store: BookingStore,
}

impl BookingViewController {
    /// Controller with the default store configuration.
    #[must_use]
    pub fn new(environment: BookingEnvironment) -> Self {
        Self::with_config(environment, StoreConfig::default())
    }

    /// Controller with a custom store configuration.
    #[must_use]
    pub fn with_config(environment: BookingEnvironment, config: StoreConfig) -> Self {
        Self {
            store: Store::with_config(
                BookingViewState::default(),
                BookingViewReducer::new(),
                environment,
                config,
            ),
        }
    }

    /// Send a command.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`dispose`](Self::dispose).
    pub async fn send(&self, action: impl Into<BookingAction>) -> Result<EffectHandle, StoreError> {
        self.store.send(action.into()).await
    }

    /// Open a booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`dispose`](Self::dispose).
    pub async fn open(&self, booking_id: BookingId) -> Result<EffectHandle, StoreError> {
        self.send(BookingAction::OpenBooking { booking_id }).await
    }

    /// Send a command and wait for the first effect-produced action matching
    /// `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if nothing matches within `timeout`.
    pub async fn send_and_wait_for<F>(
        &self,
        action: impl Into<BookingAction>,
        predicate: F,
        timeout: Duration,
    ) -> Result<BookingAction, StoreError>
    where
        F: Fn(&BookingAction) -> bool,
    {
        self.store
            .send_and_wait_for(action.into(), predicate, timeout)
            .await
    }

    /// Copy of the current view state.
    pub async fn snapshot(&self) -> BookingViewState {
        self.store.state(Clone::clone).await
    }

    /// Read part of the view state without cloning all of it.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&BookingViewState) -> T,
    {
        self.store.state(f).await
    }

    /// Every action produced by effects, as it happens.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BookingAction> {
        self.store.subscribe_actions()
    }

    /// Number of reconciliation timers currently armed.
    #[must_use]
    pub fn active_reconciliation_timers(&self) -> usize {
        self.store
            .active_cancellable(&EffectId::new(RECONCILIATION_EFFECT))
    }

    /// Stop polling and shut the store down, waiting up to `timeout` for
    /// in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if requests are still running
    /// when the timeout elapses.
    pub async fn dispose(self, timeout: Option<Duration>) -> Result<(), StoreError> {
        self.store
            .send(PaymentAction::StopReconciliation.into())
            .await?;
        self.store.shutdown(timeout).await
    }
}

impl Drop for BookingViewController {
    fn drop(&mut self) {
        let cancelled = self.store.cancel(&EffectId::new(RECONCILIATION_EFFECT));
        if cancelled > 0 {
            tracing::debug!(cancelled, "Stopped reconciliation on drop");
        }
    }
}

impl std::fmt::Debug for BookingViewController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingViewController")
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
