//! Two-phase date amendment: quote, then confirm.
//!
//! ```text
//! Idle -> Editing -> Quoting -> Quoted -> Confirming -> Idle
//!            ^          |         |           |
//!            +--error---+         +<--error---+
//! ```
//!
//! Editing dates from `Quoting` or `Quoted` drops the proposal and returns to
//! `Editing`; `Cancel` returns to `Idle` from anywhere.
//!
//! A confirm is only ever issued against the `amend_id` of the most recent
//! quote in the current session; anything else is refused before the
//! network.

use crate::error::{ApiError, FlowError, ValidationError};
use crate::idempotency::MutationKind;
use crate::sequencer::{RequestKind, SequenceToken};
use crate::types::{
    AmendId, AmendmentConfirmation, AmendmentProposal, BookingStatus, ConfirmedChange,
    CorrelationId, Notice, PriceDelta, StayDates,
};
use crate::view::reducer::{accept, fetch, Effects};
use crate::view::{BookingAction, BookingEnvironment, BookingViewState};
use chrono::NaiveDate;
use smallvec::smallvec;
use staydesk_core::effect::Effect;

/// Where the amendment session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmendmentPhase {
    /// No session
    #[default]
    Idle,
    /// Picking dates
    Editing,
    /// Quote in flight
    Quoting,
    /// Quote received, awaiting confirmation
    Quoted,
    /// Confirm in flight
    Confirming,
}

/// State of the amendment drawer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmendmentState {
    /// Current phase
    pub phase: AmendmentPhase,
    /// Correlation id of this session, reused by every quote
    pub request_id: Option<CorrelationId>,
    /// Candidate check-in
    pub check_in: Option<NaiveDate>,
    /// Candidate check-out
    pub check_out: Option<NaiveDate>,
    /// Most recent accepted quote
    pub proposal: Option<AmendmentProposal>,
    /// Last error
    pub error: Option<FlowError>,
}

impl AmendmentState {
    /// Server id a confirm would target, if any.
    #[must_use]
    pub fn amend_id(&self) -> Option<&AmendId> {
        match self.phase {
            AmendmentPhase::Quoted | AmendmentPhase::Confirming => {
                self.proposal.as_ref().map(|p| &p.amend_id)
            },
            _ => None,
        }
    }

    /// Price impact of the current proposal.
    #[must_use]
    pub fn price_delta(&self) -> Option<PriceDelta> {
        self.proposal.as_ref().map(AmendmentProposal::price_delta)
    }

    /// `true` while a session is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase != AmendmentPhase::Idle
    }

    fn candidate(&self) -> Result<StayDates, ValidationError> {
        let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) else {
            return Err(ValidationError::MissingDates);
        };
        let dates = StayDates { check_in, check_out };
        if dates.nights() <= 0 {
            return Err(ValidationError::InvalidDateRange);
        }
        Ok(dates)
    }
}

/// Amendment commands and results.
#[derive(Debug, Clone)]
pub enum AmendmentAction {
    /// Open a session seeded from the current stay
    Begin,

    /// Change candidate dates; drops any proposal
    EditDates {
        /// New check-in
        check_in: Option<NaiveDate>,
        /// New check-out
        check_out: Option<NaiveDate>,
    },

    /// Ask the server to price the candidate dates
    RequestQuote,

    /// Quote call finished
    QuoteReceived {
        /// Token taken when the quote started
        token: SequenceToken,
        /// Call result
        result: Result<AmendmentProposal, ApiError>,
    },

    /// Commit the most recent quote
    Confirm,

    /// Confirm call finished
    ConfirmCompleted {
        /// Token taken when the confirm started
        token: SequenceToken,
        /// Delta of the quote that was confirmed
        quoted: PriceDelta,
        /// Call result
        result: Result<AmendmentConfirmation, ApiError>,
    },

    /// Abandon the session
    Cancel,
}

impl AmendmentAction {
    /// `true` for actions produced by effects.
    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(self, Self::QuoteReceived { .. } | Self::ConfirmCompleted { .. })
    }
}

pub(crate) fn reduce(
    state: &mut BookingViewState,
    action: AmendmentAction,
    env: &BookingEnvironment,
) -> Effects {
    match action {
        AmendmentAction::Begin => {
            let Some(booking) = state.booking.as_ref() else {
                tracing::debug!("Amendment requested before the booking loaded");
                return smallvec![Effect::None];
            };
            if booking.status != BookingStatus::Confirmed {
                tracing::debug!(status = %booking.status, "Amendment not allowed for status");
                return smallvec![Effect::None];
            }
            if state.amendment.is_active() {
                return smallvec![Effect::None];
            }

            let stay = booking.stay();
            state.amendment = AmendmentState {
                phase: AmendmentPhase::Editing,
                request_id: Some(CorrelationId::new()),
                check_in: Some(stay.check_in),
                check_out: Some(stay.check_out),
                proposal: None,
                error: None,
            };
            tracing::debug!(request_id = ?state.amendment.request_id, "Amendment session opened");
            smallvec![Effect::None]
        },

        AmendmentAction::EditDates {
            check_in,
            check_out,
        } => {
            let amendment = &mut state.amendment;
            match amendment.phase {
                AmendmentPhase::Editing | AmendmentPhase::Quoting | AmendmentPhase::Quoted => {
                    amendment.check_in = check_in;
                    amendment.check_out = check_out;
                    amendment.proposal = None;
                    amendment.error = None;
                    amendment.phase = AmendmentPhase::Editing;
                    // a quote still in flight priced the old dates
                    state.sequencer.invalidate(RequestKind::AmendmentQuote);
                },
                phase => tracing::debug!(?phase, "Ignoring date edit"),
            }
            smallvec![Effect::None]
        },

        AmendmentAction::RequestQuote => request_quote(state, env),

        AmendmentAction::QuoteReceived { token, result } => {
            if !accept(state, RequestKind::AmendmentQuote, token)
                || state.amendment.phase != AmendmentPhase::Quoting
            {
                return smallvec![Effect::None];
            }
            let amendment = &mut state.amendment;
            match result {
                Ok(proposal) => {
                    tracing::debug!(
                        amend_id = %proposal.amend_id,
                        delta_minor = proposal.delta_minor,
                        "Amendment quoted"
                    );
                    amendment.check_in = Some(proposal.after.check_in);
                    amendment.check_out = Some(proposal.after.check_out);
                    amendment.proposal = Some(proposal);
                    amendment.phase = AmendmentPhase::Quoted;
                },
                Err(error) => {
                    tracing::warn!(%error, "Amendment quote failed");
                    amendment.error = Some(error.into());
                    amendment.phase = AmendmentPhase::Editing;
                },
            }
            smallvec![Effect::None]
        },

        AmendmentAction::Confirm => confirm(state, env),

        AmendmentAction::ConfirmCompleted {
            token,
            quoted,
            result,
        } => {
            if !accept(state, RequestKind::AmendmentConfirm, token) {
                return smallvec![Effect::None];
            }
            match result {
                Ok(confirmation) => {
                    let delta = confirmation.delta_minor.map_or(quoted, |delta_minor| {
                        let currency = confirmation
                            .currency
                            .clone()
                            .or_else(|| state.booking.as_ref().map(|b| b.currency.clone()))
                            .unwrap_or_default();
                        PriceDelta::from_minor(delta_minor, &currency)
                    });
                    tracing::debug!(status = %confirmation.status, ?delta, "Amendment confirmed");

                    if let (Some(booking), Some(status)) = (
                        state.booking.as_mut(),
                        BookingStatus::parse(&confirmation.status),
                    ) {
                        booking.apply_confirmed(&ConfirmedChange { status });
                    }
                    // a session opened after a cancel is not this confirm's
                    if state.amendment.phase == AmendmentPhase::Confirming {
                        state.amendment = AmendmentState::default();
                    }
                    state.notice = Some(Notice::AmendmentConfirmed { delta });
                    state.timeline.invalidate();

                    smallvec![Effect::merge(vec![
                        fetch(state, env, RequestKind::Booking),
                        fetch(state, env, RequestKind::Events),
                        fetch(state, env, RequestKind::Ledger),
                    ])]
                },
                Err(error) => {
                    tracing::warn!(%error, "Amendment confirm failed");
                    if state.amendment.phase == AmendmentPhase::Confirming {
                        state.amendment.phase = AmendmentPhase::Quoted;
                        state.amendment.error = Some(error.into());
                    }
                    smallvec![Effect::None]
                },
            }
        },

        AmendmentAction::Cancel => {
            if state.amendment.is_active() {
                tracing::debug!(phase = ?state.amendment.phase, "Amendment session cancelled");
                state.amendment = AmendmentState::default();
                state.sequencer.invalidate(RequestKind::AmendmentQuote);
            }
            smallvec![Effect::None]
        },
    }
}

fn request_quote(state: &mut BookingViewState, env: &BookingEnvironment) -> Effects {
    if !matches!(
        state.amendment.phase,
        AmendmentPhase::Editing | AmendmentPhase::Quoted | AmendmentPhase::Quoting
    ) {
        tracing::debug!(phase = ?state.amendment.phase, "Ignoring quote request");
        return smallvec![Effect::None];
    }
    let Some(booking_id) = state.booking_id.clone() else {
        state.amendment.error = Some(ValidationError::NoBookingLoaded.into());
        return smallvec![Effect::None];
    };
    let dates = match state.amendment.candidate() {
        Ok(dates) => dates,
        Err(error) => {
            tracing::debug!(%error, "Quote request failed validation");
            state.amendment.error = Some(error.into());
            state.amendment.proposal = None;
            state.amendment.phase = AmendmentPhase::Editing;
            return smallvec![Effect::None];
        },
    };
    let request_id = *state.amendment.request_id.get_or_insert_with(CorrelationId::new);

    let token = state.sequencer.begin(RequestKind::AmendmentQuote);
    let amendment = &mut state.amendment;
    amendment.phase = AmendmentPhase::Quoting;
    amendment.proposal = None;
    amendment.error = None;

    let api = env.api();
    smallvec![Effect::future(async move {
        let result = api
            .quote_amendment(booking_id, dates.check_in, dates.check_out, request_id)
            .await;
        Some(BookingAction::Amendment(AmendmentAction::QuoteReceived {
            token,
            result,
        }))
    })]
}

fn confirm(state: &mut BookingViewState, env: &BookingEnvironment) -> Effects {
    if state.amendment.phase == AmendmentPhase::Confirming {
        tracing::debug!("Confirm already in flight");
        return smallvec![Effect::None];
    }
    let proposal = state
        .amendment
        .amend_id()
        .and_then(|_| state.amendment.proposal.clone());
    let (Some(booking_id), Some(proposal)) = (state.booking_id.clone(), proposal) else {
        tracing::debug!(phase = ?state.amendment.phase, "Confirm refused without a quote");
        state.amendment.error = Some(ValidationError::MissingAmendId.into());
        return smallvec![Effect::None];
    };

    let key = env.idempotency_key(
        booking_id.as_str(),
        MutationKind::AmendmentConfirm,
        proposal.delta_minor,
    );
    let token = state.sequencer.begin(RequestKind::AmendmentConfirm);
    state.amendment.phase = AmendmentPhase::Confirming;
    state.amendment.error = None;

    let quoted = proposal.price_delta();
    let api = env.api();
    smallvec![Effect::future(async move {
        let result = api
            .confirm_amendment(booking_id, proposal.amend_id, key)
            .await;
        Some(BookingAction::Amendment(AmendmentAction::ConfirmCompleted {
            token,
            quoted,
            result,
        }))
    })]
}
