//! Reducer of the booking view.

use super::{BookingAction, BookingEnvironment, BookingViewState, Freshness};
use crate::payment::RECONCILIATION_EFFECT;
use crate::sequencer::{RequestKind, SequenceToken};
use crate::{amendment, cancellation, payment, timeline};
use staydesk_core::{effect::Effect, reducer::Reducer};
use smallvec::{smallvec, SmallVec};

/// Effects returned by the booking reducers
pub type Effects = SmallVec<[Effect<BookingAction>; 4]>;

/// Top-level reducer composing the amendment, payment and cancellation flows
/// with the booking, payment, events and ledger fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingViewReducer;

impl BookingViewReducer {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for BookingViewReducer {
    type State = BookingViewState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            BookingAction::OpenBooking { booking_id } => {
                tracing::debug!(%booking_id, "Opening booking");
                state.reset(Some(booking_id));
                smallvec![
                    Effect::Cancel(RECONCILIATION_EFFECT.into()),
                    Effect::merge(vec![
                        fetch(state, env, RequestKind::Booking),
                        fetch(state, env, RequestKind::Payment),
                        fetch(state, env, RequestKind::Events),
                        fetch(state, env, RequestKind::Ledger),
                    ]),
                ]
            },

            BookingAction::CloseBooking => {
                tracing::debug!(booking_id = ?state.booking_id, "Closing booking");
                state.reset(None);
                smallvec![Effect::Cancel(RECONCILIATION_EFFECT.into())]
            },

            BookingAction::RefreshBooking => smallvec![fetch(state, env, RequestKind::Booking)],
            BookingAction::RefreshPayment => smallvec![fetch(state, env, RequestKind::Payment)],
            BookingAction::RefreshLedger => smallvec![fetch(state, env, RequestKind::Ledger)],

            BookingAction::RefreshTimeline => {
                if state.timeline.needs_refresh() {
                    smallvec![fetch(state, env, RequestKind::Events)]
                } else {
                    tracing::trace!("Timeline is fresh, skipping refetch");
                    smallvec![Effect::None]
                }
            },

            BookingAction::DismissNotice => {
                state.notice = None;
                smallvec![Effect::None]
            },

            BookingAction::BookingLoaded { token, result } => {
                if accept(state, RequestKind::Booking, token) {
                    match result {
                        Ok(booking) => {
                            state.load_errors.remove(&RequestKind::Booking);
                            state.booking = Some(booking);
                        },
                        Err(error) => record_load_error(state, RequestKind::Booking, error),
                    }
                }
                smallvec![Effect::None]
            },

            BookingAction::PaymentLoaded { token, result } => {
                if accept(state, RequestKind::Payment, token) {
                    match result {
                        Ok(snapshot) => {
                            state.load_errors.remove(&RequestKind::Payment);
                            state.payment.apply_snapshot(snapshot);
                        },
                        Err(error) => record_load_error(state, RequestKind::Payment, error),
                    }
                }
                smallvec![Effect::None]
            },

            BookingAction::EventsLoaded { token, result } => {
                if accept(state, RequestKind::Events, token) {
                    match result {
                        Ok(raw) => {
                            state.load_errors.remove(&RequestKind::Events);
                            state.timeline.events = timeline::normalize(&raw);
                            state.timeline.freshness = Freshness::Fresh;
                        },
                        Err(error) => record_load_error(state, RequestKind::Events, error),
                    }
                }
                smallvec![Effect::None]
            },

            BookingAction::LedgerLoaded { token, result } => {
                if accept(state, RequestKind::Ledger, token) {
                    match result {
                        Ok(ledger) => {
                            state.load_errors.remove(&RequestKind::Ledger);
                            state.ledger = Some(ledger);
                        },
                        Err(error) => record_load_error(state, RequestKind::Ledger, error),
                    }
                }
                smallvec![Effect::None]
            },

            BookingAction::Amendment(action) => amendment::reduce(state, action, env),
            BookingAction::Payment(action) => payment::reduce(state, action, env),
            BookingAction::Cancellation(action) => cancellation::reduce(state, action, env),
        }
    }
}

/// Start a read of `kind` for the open booking.
///
/// Takes a sequence token, raises the loading flag and returns the fetch
/// effect. Without an open booking, or for a mutation kind, nothing happens.
pub(crate) fn fetch(
    state: &mut BookingViewState,
    env: &BookingEnvironment,
    kind: RequestKind,
) -> Effect<BookingAction> {
    let Some(id) = state.booking_id.clone() else {
        tracing::debug!(kind = kind.as_str(), "No booking open, skipping fetch");
        return Effect::None;
    };
    if !matches!(
        kind,
        RequestKind::Booking | RequestKind::Payment | RequestKind::Events | RequestKind::Ledger
    ) {
        return Effect::None;
    }

    let token = state.sequencer.begin(kind);
    state.loading.insert(kind);
    let api = env.api();

    match kind {
        RequestKind::Booking => Effect::future(async move {
            let result = api.get_booking(id).await;
            Some(BookingAction::BookingLoaded { token, result })
        }),
        RequestKind::Payment => Effect::future(async move {
            let result = api.get_payment_state(id).await;
            Some(BookingAction::PaymentLoaded { token, result })
        }),
        RequestKind::Events => Effect::future(async move {
            let result = api.get_events(id).await;
            Some(BookingAction::EventsLoaded { token, result })
        }),
        _ => Effect::future(async move {
            let result = api.get_ledger_summary(id).await;
            Some(BookingAction::LedgerLoaded { token, result })
        }),
    }
}

/// Check a result's token against the live counter.
///
/// Clears the loading flag for current results; stale ones are dropped with
/// a trace line and touch nothing.
pub(crate) fn accept(state: &mut BookingViewState, kind: RequestKind, token: SequenceToken) -> bool {
    if state.sequencer.is_current(&kind, token) {
        state.loading.remove(&kind);
        true
    } else {
        tracing::trace!(
            kind = kind.as_str(),
            %token,
            current = state.sequencer.current(&kind),
            "Discarding stale response"
        );
        metrics::counter!("booking.stale_responses.discarded", "kind" => kind.as_str())
            .increment(1);
        false
    }
}

fn record_load_error(state: &mut BookingViewState, kind: RequestKind, error: crate::error::ApiError) {
    tracing::warn!(kind = kind.as_str(), %error, "Fetch failed");
    state.load_errors.insert(kind, error);
}
