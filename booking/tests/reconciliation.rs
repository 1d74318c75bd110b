//! Integration tests for payment capture and reconciliation polling
//!
//! Time is paused, so the 5s interval and 30s timeout elapse instantly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::*;
use serde_json::json;
use staydesk_booking::api::{ApiCall, Operation, ScriptedBookingApi};
use staydesk_booking::error::{ApiError, FlowError, ValidationError};
use staydesk_booking::payment::{CapturePhase, PaymentAction, ReconciliationPhase, StopReason};
use staydesk_booking::types::{
    BookingStatus, CaptureAck, Notice, PaymentIntentId, PaymentSnapshot, ProcessorStatus,
};
use staydesk_booking::view::BookingViewController;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

fn capture_backend() -> ScriptedBookingApi {
    let api = backend(BookingStatus::Confirmed);
    api.respond(Ok(PaymentIntentId::new("pi_9")))
        .respond(Ok(CaptureAck {
            intent_id: PaymentIntentId::new("pi_9"),
            status: Some("processing".into()),
        }));
    api
}

async fn capture(controller: &BookingViewController, amount: &str) {
    controller
        .send(PaymentAction::Capture {
            amount: amount.to_string(),
            currency: String::new(),
        })
        .await
        .unwrap()
        .wait()
        .await;
}

// ============================================================================
// Capture
// ============================================================================

#[tokio::test(start_paused = true)]
async fn capture_creates_intent_then_captures_it() {
    let api = capture_backend();
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;

    let intents = api.calls_to(Operation::CreatePaymentIntent);
    let [ApiCall::CreatePaymentIntent {
        amount_minor,
        currency,
        idempotency_key: intent_key,
        ..
    }] = intents.as_slice()
    else {
        panic!("expected one intent call");
    };
    assert_eq!(*amount_minor, 4_500);
    assert_eq!(currency, "EUR");

    let captures = api.calls_to(Operation::CapturePayment);
    let [ApiCall::CapturePayment {
        intent_id,
        idempotency_key: capture_key,
    }] = captures.as_slice()
    else {
        panic!("expected one capture call");
    };
    assert_eq!(intent_id.as_str(), "pi_9");
    assert_ne!(intent_key, capture_key);

    let payment = controller.state(|s| s.payment.clone()).await;
    assert_eq!(payment.capture, CapturePhase::Captured);
    assert_eq!(payment.last_intent, Some(PaymentIntentId::new("pi_9")));
    assert!(payment.reconciliation.is_polling());
    assert!(controller.active_reconciliation_timers() >= 1);

    controller.dispose(None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn invalid_amount_never_reaches_backend() {
    let api = capture_backend();
    let controller = opened(&api).await;
    api.clear_calls();

    capture(&controller, "12,50").await;
    assert_eq!(
        controller.state(|s| s.payment.error.clone()).await,
        Some(FlowError::Validation(ValidationError::NonNumericAmount))
    );

    capture(&controller, "-3").await;
    assert_eq!(
        controller.state(|s| s.payment.error.clone()).await,
        Some(FlowError::Validation(ValidationError::NonPositiveAmount))
    );

    assert!(api.calls().is_empty());
    assert!(!controller.state(|s| s.payment.reconciliation.is_polling()).await);
}

#[tokio::test(start_paused = true)]
async fn failed_intent_skips_capture_and_polling() {
    let api = backend(BookingStatus::Confirmed);
    api.respond::<PaymentIntentId>(Err(ApiError::Rejected {
        status: 422,
        message: "amount exceeds balance".into(),
    }));
    let controller = opened(&api).await;

    capture(&controller, "500").await;

    assert_eq!(api.count(Operation::CapturePayment), 0);
    let payment = controller.state(|s| s.payment.clone()).await;
    assert_eq!(payment.capture, CapturePhase::Idle);
    assert!(matches!(payment.error, Some(FlowError::Api(ApiError::Rejected { .. }))));
    assert_eq!(payment.reconciliation.phase, ReconciliationPhase::Inactive);
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn unconfirmed_capture_times_out_with_advisory() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;
    let reads_before = api.count(Operation::GetPaymentState);

    capture(&controller, "45.00").await;
    tokio::time::sleep(Duration::from_secs(31)).await;

    let view = controller.snapshot().await;
    assert_eq!(
        view.payment.reconciliation.phase,
        ReconciliationPhase::Finished(StopReason::TimedOut)
    );
    assert!(view.notice.as_ref().is_some_and(Notice::is_advisory));
    assert!(view.payment.error.is_none());
    assert!(view.load_errors.is_empty());
    assert_eq!(
        view.payment.aggregate.as_ref().map(|a| a.status),
        Some(ProcessorStatus::Processing)
    );
    assert_eq!(controller.active_reconciliation_timers(), 0);

    // one read per 5s tick, starting right away
    let polls = api.count(Operation::GetPaymentState) - reads_before;
    assert!((6..=7).contains(&polls), "unexpected poll count {polls}");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.count(Operation::GetPaymentState) - reads_before, polls);
}

#[tokio::test(start_paused = true)]
async fn terminal_status_stops_polling_early() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::RequiresCapture, 0)))
        .respond(Ok(payment(ProcessorStatus::Processing, 0)))
        .respond(Ok(payment(ProcessorStatus::Processing, 0)))
        .respond(Ok(payment(ProcessorStatus::Succeeded, 4_500)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    tokio::time::sleep(Duration::from_secs(12)).await;

    let view = controller.snapshot().await;
    assert_eq!(
        view.payment.reconciliation.phase,
        ReconciliationPhase::Finished(StopReason::TerminalStatus(ProcessorStatus::Succeeded))
    );
    assert!(view.payment.aggregate_trusted);
    assert_eq!(view.payment.aggregate.as_ref().map(|a| a.paid_minor), Some(4_500));
    assert_eq!(
        view.notice.as_ref().map(Notice::message).as_deref(),
        Some("Payment status updated: succeeded")
    );
    // the ledger is refreshed once the payment settles
    assert_eq!(api.count(Operation::GetLedgerSummary), 2);
    assert_eq!(controller.active_reconciliation_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn expected_event_stops_polling() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    api.clear_responses::<serde_json::Value>()
        .respond(Ok(events()))
        .respond(Ok(events()))
        .respond(Ok(json!([
            { "id": "ev_3", "type": "payment.captured", "occurred_at": "2025-05-02T10:00:00Z" }
        ])));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    tokio::time::sleep(Duration::from_secs(7)).await;

    let view = controller.snapshot().await;
    assert_eq!(
        view.payment.reconciliation.phase,
        ReconciliationPhase::Finished(StopReason::ExpectedEvent)
    );
    // polled events are merged into what was already shown
    let types: Vec<_> = view
        .timeline
        .events
        .iter()
        .map(|e| e.event_type.as_str())
        .collect();
    assert_eq!(types, ["booking.created", "booking.confirmed", "payment.captured"]);
}

#[tokio::test(start_paused = true)]
async fn failing_ticks_do_not_surface_errors() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)))
        .respond::<PaymentSnapshot>(Err(ApiError::Server { status: 502 }));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    tokio::time::sleep(Duration::from_secs(12)).await;

    let view = controller.snapshot().await;
    assert!(view.payment.reconciliation.is_polling());
    assert!(view.payment.error.is_none());
    assert_eq!(
        view.payment.aggregate.as_ref().map(|a| a.status),
        Some(ProcessorStatus::Processing)
    );

    controller.dispose(None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restarting_replaces_the_running_session() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    controller
        .send(PaymentAction::StartReconciliation {
            expected_event_type: Some("payment.refunded".into()),
            timeout: None,
        })
        .await
        .unwrap();

    // the first session's timeout would have fired at 30s
    tokio::time::sleep(Duration::from_secs(15)).await;
    let reconciliation = controller.state(|s| s.payment.reconciliation.clone()).await;
    assert!(reconciliation.is_polling());
    assert_eq!(reconciliation.generation, 2);
    assert_eq!(reconciliation.expected_event_type, "payment.refunded");

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(
        controller.state(|s| s.payment.reconciliation.phase).await,
        ReconciliationPhase::Finished(StopReason::TimedOut)
    );
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stop_cancels_timers() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    controller.send(PaymentAction::StopReconciliation).await.unwrap();
    controller.send(PaymentAction::StopReconciliation).await.unwrap();

    assert_eq!(controller.active_reconciliation_timers(), 0);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let polls = api.count(Operation::GetPaymentState);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.count(Operation::GetPaymentState), polls);
    assert!(controller.state(|s| s.notice.is_none()).await);
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_polling() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    controller.dispose(Some(Duration::from_secs(1))).await.unwrap();

    let polls = api.count(Operation::GetPaymentState);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.count(Operation::GetPaymentState), polls);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_controller_stops_polling() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    drop(controller);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let polls = api.count(Operation::GetPaymentState);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.count(Operation::GetPaymentState), polls);
}

#[tokio::test(start_paused = true)]
async fn closing_the_booking_stops_polling() {
    let api = capture_backend();
    api.clear_responses::<PaymentSnapshot>()
        .respond(Ok(payment(ProcessorStatus::Processing, 0)));
    let controller = opened(&api).await;

    capture(&controller, "45.00").await;
    controller
        .send(staydesk_booking::BookingAction::CloseBooking)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let polls = api.count(Operation::GetPaymentState);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.count(Operation::GetPaymentState), polls);
    assert!(controller.state(|s| s.booking_id.is_none()).await);
}
