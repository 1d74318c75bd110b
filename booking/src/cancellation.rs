//! Booking cancellation behind a confirmation gate.

use crate::error::{ApiError, FlowError, ValidationError};
use crate::idempotency::MutationKind;
use crate::sequencer::{RequestKind, SequenceToken};
use crate::types::{BookingStatus, CancellationOutcome, ConfirmedChange, Notice};
use crate::view::reducer::{accept, fetch, Effects};
use crate::view::{BookingAction, BookingEnvironment, BookingViewState};
use smallvec::smallvec;
use staydesk_core::effect::Effect;

/// Cancellation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationPhase {
    /// Gate closed
    #[default]
    Idle,
    /// Waiting for the user to confirm
    AwaitingConfirmation,
    /// Cancel call in flight
    Submitting,
}

/// State of the cancellation dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancellationState {
    /// Current phase
    pub phase: CancellationPhase,
    /// Last error
    pub error: Option<FlowError>,
    /// Response of the last successful cancel
    pub outcome: Option<CancellationOutcome>,
}

impl CancellationState {
    /// `true` while the confirmation dialog is open.
    #[must_use]
    pub fn awaiting_confirmation(&self) -> bool {
        self.phase == CancellationPhase::AwaitingConfirmation
    }
}

/// Cancellation commands and results.
#[derive(Debug, Clone)]
pub enum CancellationAction {
    /// Open the confirmation gate
    Request,
    /// Confirm and send the cancellation
    Confirm,
    /// Close the gate without cancelling
    Dismiss,
    /// Cancel call finished
    Completed {
        /// Token taken when the call started
        token: SequenceToken,
        /// Call result
        result: Result<CancellationOutcome, ApiError>,
    },
}

impl CancellationAction {
    /// `true` for actions produced by effects.
    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

fn ensure_cancellable(state: &BookingViewState) -> Result<(), ValidationError> {
    match state.booking.as_ref() {
        None => Err(ValidationError::NoBookingLoaded),
        Some(booking) if booking.status != BookingStatus::Confirmed => {
            Err(ValidationError::StatusNotConfirmed {
                status: booking.status,
            })
        },
        Some(_) => Ok(()),
    }
}

pub(crate) fn reduce(
    state: &mut BookingViewState,
    action: CancellationAction,
    env: &BookingEnvironment,
) -> Effects {
    match action {
        CancellationAction::Request => {
            if state.cancellation.phase == CancellationPhase::Submitting {
                return smallvec![Effect::None];
            }
            match ensure_cancellable(state) {
                Ok(()) => {
                    state.cancellation.phase = CancellationPhase::AwaitingConfirmation;
                    state.cancellation.error = None;
                },
                Err(error) => {
                    tracing::debug!(%error, "Cancellation rejected");
                    state.cancellation.phase = CancellationPhase::Idle;
                    state.cancellation.error = Some(error.into());
                },
            }
            smallvec![Effect::None]
        },

        CancellationAction::Dismiss => {
            if state.cancellation.awaiting_confirmation() {
                state.cancellation.phase = CancellationPhase::Idle;
            }
            smallvec![Effect::None]
        },

        CancellationAction::Confirm => {
            match state.cancellation.phase {
                CancellationPhase::AwaitingConfirmation => {},
                CancellationPhase::Submitting => {
                    tracing::debug!("Cancellation already in flight");
                    return smallvec![Effect::None];
                },
                CancellationPhase::Idle => {
                    // a status rejection explains more than the missing gate
                    let error = ensure_cancellable(state)
                        .err()
                        .unwrap_or(ValidationError::CancellationNotRequested);
                    state.cancellation.error = Some(error.into());
                    return smallvec![Effect::None];
                },
            }
            // the booking may have been refreshed while the dialog was open
            if let Err(error) = ensure_cancellable(state) {
                state.cancellation.phase = CancellationPhase::Idle;
                state.cancellation.error = Some(error.into());
                return smallvec![Effect::None];
            }
            let Some(booking_id) = state.booking_id.clone() else {
                state.cancellation.error = Some(ValidationError::NoBookingLoaded.into());
                return smallvec![Effect::None];
            };

            let key = env.idempotency_key(booking_id.as_str(), MutationKind::BookingCancel, 0);
            let token = state.sequencer.begin(RequestKind::Cancellation);
            state.cancellation.phase = CancellationPhase::Submitting;
            state.cancellation.error = None;
            tracing::info!(%booking_id, "Cancelling booking");

            let api = env.api();
            smallvec![Effect::future(async move {
                let result = api.cancel_booking(booking_id, key).await;
                Some(BookingAction::Cancellation(CancellationAction::Completed {
                    token,
                    result,
                }))
            })]
        },

        CancellationAction::Completed { token, result } => {
            if !accept(state, RequestKind::Cancellation, token) {
                return smallvec![Effect::None];
            }
            match result {
                Ok(outcome) => {
                    let status = outcome.confirmed_status();
                    let currency = state
                        .booking
                        .as_ref()
                        .map(|b| b.currency.clone())
                        .unwrap_or_default();
                    if let Some(booking) = state.booking.as_mut() {
                        booking.apply_confirmed(&ConfirmedChange { status });
                    }
                    tracing::info!(%status, "Booking cancelled");

                    state.notice = Some(Notice::BookingCancelled {
                        figures: outcome.figures(&currency),
                    });
                    state.cancellation = CancellationState {
                        phase: CancellationPhase::Idle,
                        error: None,
                        outcome: Some(outcome),
                    };
                    state.timeline.invalidate();

                    smallvec![Effect::merge(vec![
                        fetch(state, env, RequestKind::Events),
                        fetch(state, env, RequestKind::Ledger),
                    ])]
                },
                Err(error) => {
                    tracing::warn!(%error, "Cancellation failed");
                    state.cancellation.phase = CancellationPhase::AwaitingConfirmation;
                    state.cancellation.error = Some(error.into());
                    smallvec![Effect::None]
                },
            }
        },
    }
}
