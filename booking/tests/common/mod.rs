//! Fixtures shared by the booking integration tests.

#![allow(dead_code)] // Not every test binary uses every fixture
#![allow(clippy::unwrap_used, clippy::panic)] // Test code

use chrono::NaiveDate;
use serde_json::json;
use staydesk_booking::api::ScriptedBookingApi;
use staydesk_booking::types::{
    AmendId, AmendmentProposal, Booking, BookingId, BookingStatus, CorrelationId, LedgerSummary,
    PaymentAggregate, PaymentSnapshot, ProcessorStatus, StaySnapshot,
};
use staydesk_booking::view::{BookingEnvironment, BookingViewController};
use staydesk_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;

pub const BOOKING: &str = "bk_42";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn booking(status: BookingStatus) -> Booking {
    Booking {
        id: BookingId::new(BOOKING),
        status,
        check_in: date(2025, 6, 10),
        check_out: date(2025, 6, 13),
        total_minor: 36_000,
        currency: "EUR".to_string(),
        notes: None,
    }
}

pub fn payment(status: ProcessorStatus, paid_minor: i64) -> PaymentSnapshot {
    PaymentSnapshot {
        aggregate: PaymentAggregate {
            total_minor: 36_000,
            paid_minor,
            refunded_minor: 0,
            currency: "EUR".to_string(),
            status,
        },
        transactions: vec![],
    }
}

pub fn ledger(paid_minor: i64) -> LedgerSummary {
    LedgerSummary {
        total_minor: 36_000,
        paid_minor,
        refunded_minor: 0,
        balance_minor: 36_000 - paid_minor,
        currency: "EUR".to_string(),
        extra: serde_json::Map::new(),
    }
}

pub fn events() -> serde_json::Value {
    json!({ "items": [
        { "id": "ev_1", "type": "booking.created", "occurred_at": "2025-05-01T09:00:00Z" },
        { "id": "ev_2", "type": "booking.confirmed", "occurred_at": "2025-05-01T09:05:00Z" },
    ]})
}

pub fn proposal(check_in: NaiveDate, check_out: NaiveDate, delta_minor: i64) -> AmendmentProposal {
    AmendmentProposal {
        amend_id: AmendId::new("am_7"),
        request_id: CorrelationId::new(),
        before: StaySnapshot {
            check_in: date(2025, 6, 10),
            check_out: date(2025, 6, 13),
            total_minor: 36_000,
        },
        after: StaySnapshot {
            check_in,
            check_out,
            total_minor: 36_000 + delta_minor,
        },
        delta_minor,
        currency: "EUR".to_string(),
    }
}

/// Backend answering every read for a booking in `status`.
pub fn backend(status: BookingStatus) -> ScriptedBookingApi {
    let api = ScriptedBookingApi::new();
    api.respond(Ok(booking(status)))
        .respond(Ok(payment(ProcessorStatus::RequiresCapture, 0)))
        .respond(Ok(events()))
        .respond(Ok(ledger(0)));
    api
}

pub fn controller(api: &ScriptedBookingApi) -> BookingViewController {
    staydesk_testing::init_test_tracing();
    let env = BookingEnvironment::new(Arc::new(test_clock()), Arc::new(api.clone()));
    BookingViewController::new(env)
}

/// Open the booking and wait for every initial read to land.
pub async fn opened(api: &ScriptedBookingApi) -> BookingViewController {
    let controller = controller(api);
    controller
        .open(BookingId::new(BOOKING))
        .await
        .unwrap()
        .wait()
        .await;
    controller
}

/// Let spawned fetches run until nothing is loading.
pub async fn settle(controller: &BookingViewController) {
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if controller.state(|s| s.loading.is_empty()).await {
            return;
        }
    }
    panic!("view did not settle");
}
