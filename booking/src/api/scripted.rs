//! In-memory [`BookingApi`] that replays scripted responses.
//!
//! Each operation has its own queue. Responses are consumed in order; the
//! last one stays in place and answers every further call, so a test that
//! only cares about "the payment is still processing" scripts it once.
//! Every call is recorded before its (optional) delay starts.

use super::{ApiFuture, ApiResult, BookingApi};
use crate::error::ApiError;
use crate::idempotency::IdempotencyKey;
use crate::types::{
    AmendId, AmendmentConfirmation, AmendmentProposal, Booking, BookingId, CancellationOutcome,
    CaptureAck, CorrelationId, LedgerSummary, PaymentIntentId, PaymentSnapshot,
};
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Backend operation names, for filtering recorded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get_booking`
    GetBooking,
    /// `get_payment_state`
    GetPaymentState,
    /// `get_events`
    GetEvents,
    /// `quote_amendment`
    QuoteAmendment,
    /// `confirm_amendment`
    ConfirmAmendment,
    /// `create_payment_intent`
    CreatePaymentIntent,
    /// `capture_payment`
    CapturePayment,
    /// `cancel_booking`
    CancelBooking,
    /// `get_ledger_summary`
    GetLedgerSummary,
}

/// A recorded backend call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // Variant fields mirror the `BookingApi` arguments
pub enum ApiCall {
    GetBooking(BookingId),
    GetPaymentState(BookingId),
    GetEvents(BookingId),
    QuoteAmendment {
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        request_id: CorrelationId,
    },
    ConfirmAmendment {
        id: BookingId,
        amend_id: AmendId,
        idempotency_key: IdempotencyKey,
    },
    CreatePaymentIntent {
        id: BookingId,
        amount_minor: i64,
        currency: String,
        idempotency_key: IdempotencyKey,
    },
    CapturePayment {
        intent_id: PaymentIntentId,
        idempotency_key: IdempotencyKey,
    },
    CancelBooking {
        id: BookingId,
        idempotency_key: IdempotencyKey,
    },
    GetLedgerSummary(BookingId),
}

impl ApiCall {
    /// Which operation was called.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::GetBooking(_) => Operation::GetBooking,
            Self::GetPaymentState(_) => Operation::GetPaymentState,
            Self::GetEvents(_) => Operation::GetEvents,
            Self::QuoteAmendment { .. } => Operation::QuoteAmendment,
            Self::ConfirmAmendment { .. } => Operation::ConfirmAmendment,
            Self::CreatePaymentIntent { .. } => Operation::CreatePaymentIntent,
            Self::CapturePayment { .. } => Operation::CapturePayment,
            Self::CancelBooking { .. } => Operation::CancelBooking,
            Self::GetLedgerSummary(_) => Operation::GetLedgerSummary,
        }
    }

    /// `true` for calls that change backend state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::ConfirmAmendment { .. }
                | Self::CreatePaymentIntent { .. }
                | Self::CapturePayment { .. }
                | Self::CancelBooking { .. }
        )
    }
}

struct Step<T> {
    result: ApiResult<T>,
    delay: Duration,
}

impl<T: Clone> Clone for Step<T> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
            delay: self.delay,
        }
    }
}

/// Response queue for one operation.
pub struct Script<T> {
    steps: VecDeque<Step<T>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
        }
    }
}

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Option<Step<T>> {
        if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        }
    }
}

/// All response queues of a [`ScriptedBookingApi`].
#[derive(Default)]
pub struct ScriptBook {
    booking: Script<Booking>,
    payment: Script<PaymentSnapshot>,
    events: Script<serde_json::Value>,
    quote: Script<AmendmentProposal>,
    confirm: Script<AmendmentConfirmation>,
    intent: Script<PaymentIntentId>,
    capture: Script<CaptureAck>,
    cancel: Script<CancellationOutcome>,
    ledger: Script<LedgerSummary>,
}

/// Response types that can be scripted; each maps to exactly one operation.
pub trait ScriptedResponse: Clone + Send + 'static {
    /// The operation answered with this type
    const OPERATION: Operation;

    /// Queue holding this type's responses
    fn script(book: &mut ScriptBook) -> &mut Script<Self>;
}

macro_rules! scripted_response {
    ($ty:ty, $field:ident, $op:ident) => {
        impl ScriptedResponse for $ty {
            const OPERATION: Operation = Operation::$op;

            fn script(book: &mut ScriptBook) -> &mut Script<Self> {
                &mut book.$field
            }
        }
    };
}

scripted_response!(Booking, booking, GetBooking);
scripted_response!(PaymentSnapshot, payment, GetPaymentState);
scripted_response!(serde_json::Value, events, GetEvents);
scripted_response!(AmendmentProposal, quote, QuoteAmendment);
scripted_response!(AmendmentConfirmation, confirm, ConfirmAmendment);
scripted_response!(PaymentIntentId, intent, CreatePaymentIntent);
scripted_response!(CaptureAck, capture, CapturePayment);
scripted_response!(CancellationOutcome, cancel, CancelBooking);
scripted_response!(LedgerSummary, ledger, GetLedgerSummary);

#[derive(Default)]
struct Inner {
    book: ScriptBook,
    calls: Vec<ApiCall>,
}

/// Scripted backend for tests and demos.
///
/// ```
/// use staydesk_booking::api::ScriptedBookingApi;
/// use staydesk_booking::error::ApiError;
/// use staydesk_booking::types::Booking;
///
/// let api = ScriptedBookingApi::new();
/// api.respond::<Booking>(Err(ApiError::NotFound));
/// assert!(api.calls().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct ScriptedBookingApi {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for ScriptedBookingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBookingApi")
            .field("calls", &self.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl ScriptedBookingApi {
    /// Empty script; unscripted operations fail with a transport error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an immediate response.
    pub fn respond<T: ScriptedResponse>(&self, result: ApiResult<T>) -> &Self {
        self.respond_after(Duration::ZERO, result)
    }

    /// Queue a response delivered after `delay` (tokio time).
    pub fn respond_after<T: ScriptedResponse>(&self, delay: Duration, result: ApiResult<T>) -> &Self {
        T::script(&mut self.lock().book)
            .steps
            .push_back(Step { result, delay });
        self
    }

    /// Drop all queued responses of type `T`.
    pub fn clear_responses<T: ScriptedResponse>(&self) -> &Self {
        T::script(&mut self.lock().book).steps.clear();
        self
    }

    /// Every call made so far, in issue order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Calls of one operation.
    #[must_use]
    pub fn calls_to(&self, operation: Operation) -> Vec<ApiCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    /// Number of calls of one operation.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget recorded calls, keeping the script.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn answer<T: ScriptedResponse>(&self, call: ApiCall) -> ApiFuture<T> {
        let step = {
            let mut inner = self.lock();
            inner.calls.push(call);
            T::script(&mut inner.book).next()
        };

        Box::pin(async move {
            let Some(step) = step else {
                return Err(ApiError::Transport(format!(
                    "no scripted response for {:?}",
                    T::OPERATION
                )));
            };
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            step.result
        })
    }
}

impl BookingApi for ScriptedBookingApi {
    fn get_booking(&self, id: BookingId) -> ApiFuture<Booking> {
        self.answer(ApiCall::GetBooking(id))
    }

    fn get_payment_state(&self, id: BookingId) -> ApiFuture<PaymentSnapshot> {
        self.answer(ApiCall::GetPaymentState(id))
    }

    fn get_events(&self, id: BookingId) -> ApiFuture<serde_json::Value> {
        self.answer(ApiCall::GetEvents(id))
    }

    fn quote_amendment(
        &self,
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        request_id: CorrelationId,
    ) -> ApiFuture<AmendmentProposal> {
        self.answer(ApiCall::QuoteAmendment {
            id,
            check_in,
            check_out,
            request_id,
        })
    }

    fn confirm_amendment(
        &self,
        id: BookingId,
        amend_id: AmendId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<AmendmentConfirmation> {
        self.answer(ApiCall::ConfirmAmendment {
            id,
            amend_id,
            idempotency_key,
        })
    }

    fn create_payment_intent(
        &self,
        id: BookingId,
        amount_minor: i64,
        currency: String,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<PaymentIntentId> {
        self.answer(ApiCall::CreatePaymentIntent {
            id,
            amount_minor,
            currency,
            idempotency_key,
        })
    }

    fn capture_payment(
        &self,
        intent_id: PaymentIntentId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CaptureAck> {
        self.answer(ApiCall::CapturePayment {
            intent_id,
            idempotency_key,
        })
    }

    fn cancel_booking(
        &self,
        id: BookingId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CancellationOutcome> {
        self.answer(ApiCall::CancelBooking { id, idempotency_key })
    }

    fn get_ledger_summary(&self, id: BookingId) -> ApiFuture<LedgerSummary> {
        self.answer(ApiCall::GetLedgerSummary(id))
    }
}
