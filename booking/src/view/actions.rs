//! Actions of the booking view.

use crate::amendment::AmendmentAction;
use crate::cancellation::CancellationAction;
use crate::error::ApiError;
use crate::payment::PaymentAction;
use crate::sequencer::SequenceToken;
use crate::types::{Booking, BookingId, LedgerSummary, PaymentSnapshot};

/// Everything the booking view reacts to.
///
/// Commands come from the rendering layer; `*Loaded` actions are produced by
/// fetch effects and carry the [`SequenceToken`] taken when the fetch
/// started.
#[derive(Debug, Clone)]
pub enum BookingAction {
    /// Load a booking, discarding everything about the previous one
    OpenBooking {
        /// Booking to open
        booking_id: BookingId,
    },

    /// Stop polling and clear all state
    CloseBooking,

    /// Refetch the booking snapshot
    RefreshBooking,

    /// Refetch the event timeline if it was invalidated or never loaded
    RefreshTimeline,

    /// Refetch payment aggregate and transactions
    RefreshPayment,

    /// Refetch the ledger summary
    RefreshLedger,

    /// Clear the current notice
    DismissNotice,

    /// Booking fetch finished
    BookingLoaded {
        /// Token taken when the fetch started
        token: SequenceToken,
        /// Fetch result
        result: Result<Booking, ApiError>,
    },

    /// Payment fetch finished
    PaymentLoaded {
        /// Token taken when the fetch started
        token: SequenceToken,
        /// Fetch result
        result: Result<PaymentSnapshot, ApiError>,
    },

    /// Events fetch finished (raw payload)
    EventsLoaded {
        /// Token taken when the fetch started
        token: SequenceToken,
        /// Fetch result
        result: Result<serde_json::Value, ApiError>,
    },

    /// Ledger fetch finished
    LedgerLoaded {
        /// Token taken when the fetch started
        token: SequenceToken,
        /// Fetch result
        result: Result<LedgerSummary, ApiError>,
    },

    /// Date amendment flow
    Amendment(AmendmentAction),

    /// Payment capture and reconciliation
    Payment(PaymentAction),

    /// Booking cancellation flow
    Cancellation(CancellationAction),
}

impl From<AmendmentAction> for BookingAction {
    fn from(action: AmendmentAction) -> Self {
        Self::Amendment(action)
    }
}

impl From<PaymentAction> for BookingAction {
    fn from(action: PaymentAction) -> Self {
        Self::Payment(action)
    }
}

impl From<CancellationAction> for BookingAction {
    fn from(action: CancellationAction) -> Self {
        Self::Cancellation(action)
    }
}

impl BookingAction {
    /// `true` for actions produced by effects rather than the user.
    #[must_use]
    pub const fn is_result(&self) -> bool {
        match self {
            Self::BookingLoaded { .. }
            | Self::PaymentLoaded { .. }
            | Self::EventsLoaded { .. }
            | Self::LedgerLoaded { .. } => true,
            Self::Amendment(action) => action.is_result(),
            Self::Payment(action) => action.is_result(),
            Self::Cancellation(action) => action.is_result(),
            _ => false,
        }
    }
}
