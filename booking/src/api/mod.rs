//! Backend operations consumed by the console.
//!
//! [`BookingApi`] is the seam between the reducers and the REST backend.
//! Arguments are owned so the returned futures are `'static` and can be moved
//! straight into an `Effect::Future`.

use crate::error::ApiError;
use crate::idempotency::IdempotencyKey;
use crate::types::{
    AmendId, AmendmentConfirmation, AmendmentProposal, Booking, BookingId, CancellationOutcome,
    CaptureAck, CorrelationId, LedgerSummary, PaymentIntentId, PaymentSnapshot,
};
use chrono::NaiveDate;
use std::future::Future;
use std::pin::Pin;

pub mod http;
pub mod scripted;

pub use http::HttpBookingApi;
pub use scripted::{ApiCall, Operation, ScriptedBookingApi};

/// Backend call result
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future returned by every [`BookingApi`] method
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send>>;

/// The booking REST backend.
///
/// Mutating operations take their idempotency key or correlation id as a
/// typed argument, so a call without one does not compile.
pub trait BookingApi: Send + Sync {
    /// `GET /bookings/{id}`
    fn get_booking(&self, id: BookingId) -> ApiFuture<Booking>;

    /// `GET /bookings/{id}/payments`
    fn get_payment_state(&self, id: BookingId) -> ApiFuture<PaymentSnapshot>;

    /// `GET /bookings/{id}/events`; the raw payload is normalized client-side
    fn get_events(&self, id: BookingId) -> ApiFuture<serde_json::Value>;

    /// `POST /bookings/{id}/amendments/quote`
    fn quote_amendment(
        &self,
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        request_id: CorrelationId,
    ) -> ApiFuture<AmendmentProposal>;

    /// `POST /bookings/{id}/amendments/{amend_id}/confirm`
    fn confirm_amendment(
        &self,
        id: BookingId,
        amend_id: AmendId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<AmendmentConfirmation>;

    /// `POST /bookings/{id}/payment-intents`
    fn create_payment_intent(
        &self,
        id: BookingId,
        amount_minor: i64,
        currency: String,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<PaymentIntentId>;

    /// `POST /payment-intents/{intent_id}/capture`
    fn capture_payment(
        &self,
        intent_id: PaymentIntentId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CaptureAck>;

    /// `POST /bookings/{id}/cancel`
    fn cancel_booking(
        &self,
        id: BookingId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CancellationOutcome>;

    /// `GET /bookings/{id}/ledger`
    fn get_ledger_summary(&self, id: BookingId) -> ApiFuture<LedgerSummary>;
}
