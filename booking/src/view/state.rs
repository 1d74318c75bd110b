//! Observable state of the booking view.

use crate::amendment::AmendmentState;
use crate::cancellation::CancellationState;
use crate::error::ApiError;
use crate::payment::PaymentState;
use crate::sequencer::{RequestKind, RequestSequencer};
use crate::timeline::TimelineEvent;
use crate::types::{Booking, BookingId, LedgerSummary, Notice};
use std::collections::{BTreeMap, BTreeSet};

/// Whether the cached timeline can be shown as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Never fetched for this booking
    #[default]
    NeverLoaded,
    /// Matches the last fetch
    Fresh,
    /// A mutation happened since the last fetch
    Invalidated,
}

/// Normalized event timeline plus its freshness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineCache {
    /// Events in ascending time order
    pub events: Vec<TimelineEvent>,
    /// Freshness of `events`
    pub freshness: Freshness,
}

impl TimelineCache {
    /// `true` if `RefreshTimeline` should refetch.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.freshness != Freshness::Fresh
    }

    /// Mark the cache stale after a mutation.
    pub fn invalidate(&mut self) {
        if self.freshness == Freshness::Fresh {
            self.freshness = Freshness::Invalidated;
        }
    }
}

/// Everything the rendering layer shows for one booking.
#[derive(Debug, Clone, Default)]
pub struct BookingViewState {
    /// Booking being viewed
    pub booking_id: Option<BookingId>,
    /// Last fetched booking snapshot
    pub booking: Option<Booking>,
    /// Last fetched ledger summary
    pub ledger: Option<LedgerSummary>,
    /// Event timeline
    pub timeline: TimelineCache,
    /// Payment aggregate, capture and reconciliation
    pub payment: PaymentState,
    /// Date amendment session
    pub amendment: AmendmentState,
    /// Cancellation gate
    pub cancellation: CancellationState,
    /// Fetches in flight
    pub loading: BTreeSet<RequestKind>,
    /// Last failure per fetched resource
    pub load_errors: BTreeMap<RequestKind, ApiError>,
    /// Message for the user, if any
    pub notice: Option<Notice>,
    /// Sequence counters guarding every async result
    pub sequencer: RequestSequencer<RequestKind>,
}

impl BookingViewState {
    /// `true` while `kind` is being fetched.
    #[must_use]
    pub fn is_loading(&self, kind: RequestKind) -> bool {
        self.loading.contains(&kind)
    }

    /// Clear everything and point the view at `booking_id`.
    ///
    /// Sequence counters are bumped rather than reset, and the reconciliation
    /// generation survives, so nothing issued for the previous booking can
    /// land afterwards.
    pub(crate) fn reset(&mut self, booking_id: Option<BookingId>) {
        let mut sequencer = std::mem::take(&mut self.sequencer);
        sequencer.invalidate_all();
        let generation = self.payment.reconciliation.generation;

        *self = Self {
            booking_id,
            sequencer,
            ..Self::default()
        };
        self.payment.reconciliation.generation = generation;
    }
}
