//! Payment capture and post-capture reconciliation.
//!
//! The processor confirms a capture asynchronously through webhooks, so the
//! aggregate returned right after a capture cannot be trusted. A capture
//! therefore starts a bounded polling session: every tick refetches the
//! payment state and the timeline together, and the session ends when the
//! processor reaches a terminal status, the expected event shows up, or the
//! timeout elapses. A timeout is an advisory, never an error.
//!
//! Tick and timeout timers are registered under [`RECONCILIATION_EFFECT`]
//! and every session carries a generation number; timers of an older
//! session are cancelled and any of their actions that still arrive are
//! ignored.

use crate::error::{ApiError, FlowError, ValidationError};
use crate::idempotency::MutationKind;
use crate::sequencer::{RequestKind, SequenceToken};
use crate::timeline;
use crate::types::{
    CaptureAck, Money, Notice, PaymentAggregate, PaymentIntentId, PaymentSnapshot,
    PaymentTransaction, ProcessorStatus,
};
use crate::view::reducer::{accept, fetch, Effects};
use crate::view::{BookingAction, BookingEnvironment, BookingViewState, Freshness};
use chrono::{DateTime, Utc};
use smallvec::smallvec;
use staydesk_core::effect::Effect;
use std::time::Duration;

/// Effect id of the reconciliation tick and timeout timers.
pub const RECONCILIATION_EFFECT: &str = "reconciliation";

/// Capture progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    /// Nothing in flight
    #[default]
    Idle,
    /// Intent creation and capture in flight
    Capturing,
    /// Backend accepted the capture
    Captured,
}

/// Why a reconciliation session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The processor reported a terminal status
    TerminalStatus(ProcessorStatus),
    /// The expected event appeared in the timeline
    ExpectedEvent,
    /// Nothing conclusive before the timeout
    TimedOut,
    /// Stopped on request
    Stopped,
}

impl StopReason {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TerminalStatus(_) => "terminal_status",
            Self::ExpectedEvent => "expected_event",
            Self::TimedOut => "timed_out",
            Self::Stopped => "stopped",
        }
    }
}

/// Polling session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconciliationPhase {
    /// Never started
    #[default]
    Inactive,
    /// Ticking
    Polling,
    /// Ended
    Finished(StopReason),
}

/// The polling session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Incremented on every start; older sessions' actions are ignored
    pub generation: u64,
    /// Current phase
    pub phase: ReconciliationPhase,
    /// When the current session started
    pub started_at: Option<DateTime<Utc>>,
    /// Event type that ends the session
    pub expected_event_type: String,
    /// Session time limit
    pub timeout: Duration,
    /// Ticks issued in this session
    pub ticks: u32,
}

impl ReconciliationState {
    /// `true` while polling.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.phase == ReconciliationPhase::Polling
    }

    fn is_live(&self, generation: u64) -> bool {
        self.is_polling() && self.generation == generation
    }
}

/// Payment side of the booking view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentState {
    /// Last fetched aggregate
    pub aggregate: Option<PaymentAggregate>,
    /// Last fetched transaction history
    pub transactions: Vec<PaymentTransaction>,
    /// `false` between a local capture and the next successful refresh
    pub aggregate_trusted: bool,
    /// Capture progress
    pub capture: CapturePhase,
    /// Intent of the last successful capture
    pub last_intent: Option<PaymentIntentId>,
    /// Last capture error
    pub error: Option<FlowError>,
    /// Polling session
    pub reconciliation: ReconciliationState,
}

impl PaymentState {
    pub(crate) fn apply_snapshot(&mut self, snapshot: PaymentSnapshot) {
        self.aggregate = Some(snapshot.aggregate);
        self.transactions = snapshot.transactions;
        self.aggregate_trusted = true;
    }
}

/// Capture and reconciliation commands and results.
#[derive(Debug, Clone)]
pub enum PaymentAction {
    /// Create a payment intent for `amount` and capture it
    Capture {
        /// Amount in major units as typed by the user
        amount: String,
        /// Currency; empty means the booking's currency
        currency: String,
    },

    /// Intent creation and capture finished
    CaptureCompleted {
        /// Token taken when the capture started
        token: SequenceToken,
        /// Call result
        result: Result<CaptureAck, ApiError>,
    },

    /// Start (or restart) polling
    StartReconciliation {
        /// Event type that ends the session; configured default when `None`
        expected_event_type: Option<String>,
        /// Time limit; configured default when `None`
        timeout: Option<Duration>,
    },

    /// Stop polling; idempotent
    StopReconciliation,

    /// Interval timer fired
    ReconcileTick {
        /// Session the timer belongs to
        generation: u64,
    },

    /// One tick's fetches finished
    ReconcileTickCompleted {
        /// Session the tick belongs to
        generation: u64,
        /// Token of the payment fetch
        payment_token: SequenceToken,
        /// Token of the events fetch
        events_token: SequenceToken,
        /// Payment fetch result
        payment: Result<PaymentSnapshot, ApiError>,
        /// Events fetch result (raw)
        events: Result<serde_json::Value, ApiError>,
    },

    /// Hard timeout fired
    ReconcileTimedOut {
        /// Session the timer belongs to
        generation: u64,
    },
}

impl PaymentAction {
    /// `true` for actions produced by effects.
    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(
            self,
            Self::CaptureCompleted { .. }
                | Self::ReconcileTick { .. }
                | Self::ReconcileTickCompleted { .. }
                | Self::ReconcileTimedOut { .. }
        )
    }
}

pub(crate) fn reduce(
    state: &mut BookingViewState,
    action: PaymentAction,
    env: &BookingEnvironment,
) -> Effects {
    match action {
        PaymentAction::Capture { amount, currency } => capture(state, env, &amount, currency),

        PaymentAction::CaptureCompleted { token, result } => {
            if !accept(state, RequestKind::Capture, token) {
                return smallvec![Effect::None];
            }
            match result {
                Ok(ack) => {
                    tracing::info!(intent_id = %ack.intent_id, "Payment captured, reconciling");
                    let payment = &mut state.payment;
                    payment.capture = CapturePhase::Captured;
                    payment.aggregate_trusted = false;
                    payment.last_intent = Some(ack.intent_id);
                    payment.error = None;
                    state.timeline.invalidate();
                    start(state, env, None, None)
                },
                Err(error) => {
                    tracing::warn!(%error, "Payment capture failed");
                    state.payment.capture = CapturePhase::Idle;
                    state.payment.error = Some(error.into());
                    smallvec![Effect::None]
                },
            }
        },

        PaymentAction::StartReconciliation {
            expected_event_type,
            timeout,
        } => {
            if state.booking_id.is_none() {
                tracing::debug!("No booking open, not reconciling");
                return smallvec![Effect::None];
            }
            start(state, env, expected_event_type, timeout)
        },

        PaymentAction::StopReconciliation => {
            if state.payment.reconciliation.is_polling() {
                finish(state, StopReason::Stopped);
            }
            smallvec![Effect::Cancel(RECONCILIATION_EFFECT.into())]
        },

        PaymentAction::ReconcileTick { generation } => {
            if !state.payment.reconciliation.is_live(generation) {
                tracing::trace!(generation, "Ignoring tick of a finished session");
                return smallvec![Effect::None];
            }
            tick(state, env, generation)
        },

        PaymentAction::ReconcileTickCompleted {
            generation,
            payment_token,
            events_token,
            payment,
            events,
        } => tick_completed(
            state,
            env,
            generation,
            (payment_token, payment),
            (events_token, events),
        ),

        PaymentAction::ReconcileTimedOut { generation } => {
            if !state.payment.reconciliation.is_live(generation) {
                return smallvec![Effect::None];
            }
            finish(state, StopReason::TimedOut);
            smallvec![Effect::Cancel(RECONCILIATION_EFFECT.into())]
        },
    }
}

fn capture(
    state: &mut BookingViewState,
    env: &BookingEnvironment,
    amount: &str,
    currency: String,
) -> Effects {
    if state.payment.capture == CapturePhase::Capturing {
        tracing::debug!("Capture already in flight");
        return smallvec![Effect::None];
    }
    let (Some(booking_id), Some(booking)) = (state.booking_id.clone(), state.booking.as_ref()) else {
        state.payment.error = Some(ValidationError::NoBookingLoaded.into());
        return smallvec![Effect::None];
    };
    let currency = if currency.trim().is_empty() {
        booking.currency.clone()
    } else {
        currency.trim().to_ascii_uppercase()
    };

    let amount = match Money::parse(amount, currency) {
        None => Err(ValidationError::NonNumericAmount),
        Some(money) if money.minor <= 0 => Err(ValidationError::NonPositiveAmount),
        Some(money) => Ok(money),
    };
    let amount = match amount {
        Ok(amount) => amount,
        Err(error) => {
            tracing::debug!(%error, "Capture failed validation");
            state.payment.error = Some(error.into());
            return smallvec![Effect::None];
        },
    };

    let intent_key = env.idempotency_key(
        booking_id.as_str(),
        MutationKind::PaymentIntentCreate,
        amount.minor,
    );
    let capture_key =
        env.idempotency_key(booking_id.as_str(), MutationKind::PaymentCapture, amount.minor);
    let token = state.sequencer.begin(RequestKind::Capture);
    state.payment.capture = CapturePhase::Capturing;
    state.payment.error = None;

    let api = env.api();
    smallvec![Effect::future(async move {
        let result: Result<CaptureAck, ApiError> = async {
            let intent_id = api
                .create_payment_intent(booking_id, amount.minor, amount.currency, intent_key)
                .await?;
            api.capture_payment(intent_id, capture_key).await
        }
        .await;
        Some(BookingAction::Payment(PaymentAction::CaptureCompleted {
            token,
            result,
        }))
    })]
}

fn start(
    state: &mut BookingViewState,
    env: &BookingEnvironment,
    expected_event_type: Option<String>,
    timeout: Option<Duration>,
) -> Effects {
    let config = env.reconciliation();
    let reconciliation = &mut state.payment.reconciliation;
    reconciliation.generation += 1;
    reconciliation.phase = ReconciliationPhase::Polling;
    reconciliation.started_at = Some(env.clock().now());
    reconciliation.expected_event_type =
        expected_event_type.unwrap_or_else(|| config.expected_event_type.clone());
    reconciliation.timeout = timeout.unwrap_or(config.timeout);
    reconciliation.ticks = 0;

    let generation = reconciliation.generation;
    tracing::info!(
        generation,
        expected_event_type = %reconciliation.expected_event_type,
        timeout_ms = u64::try_from(reconciliation.timeout.as_millis()).unwrap_or(u64::MAX),
        "Starting payment reconciliation"
    );

    let timeout_timer = Effect::Delay {
        duration: reconciliation.timeout,
        action: Box::new(BookingAction::Payment(PaymentAction::ReconcileTimedOut {
            generation,
        })),
    }
    .cancellable(RECONCILIATION_EFFECT);

    let mut effects: Effects = smallvec![
        Effect::Cancel(RECONCILIATION_EFFECT.into()),
        timeout_timer,
    ];
    effects.extend(tick(state, env, generation));
    effects
}

/// Fetch payment and events once and schedule the next tick.
fn tick(state: &mut BookingViewState, env: &BookingEnvironment, generation: u64) -> Effects {
    let Some(booking_id) = state.booking_id.clone() else {
        return smallvec![Effect::None];
    };
    state.payment.reconciliation.ticks += 1;
    let payment_token = state.sequencer.begin(RequestKind::Payment);
    let events_token = state.sequencer.begin(RequestKind::Events);
    tracing::debug!(generation, tick = state.payment.reconciliation.ticks, "Reconciliation tick");

    let next_tick = Effect::Delay {
        duration: env.reconciliation().poll_interval,
        action: Box::new(BookingAction::Payment(PaymentAction::ReconcileTick {
            generation,
        })),
    }
    .cancellable(RECONCILIATION_EFFECT);

    let api = env.api();
    let fetch_both = Effect::future(async move {
        let (payment, events) = futures::join!(
            api.get_payment_state(booking_id.clone()),
            api.get_events(booking_id)
        );
        Some(BookingAction::Payment(PaymentAction::ReconcileTickCompleted {
            generation,
            payment_token,
            events_token,
            payment,
            events,
        }))
    });

    smallvec![next_tick, fetch_both]
}

fn tick_completed(
    state: &mut BookingViewState,
    env: &BookingEnvironment,
    generation: u64,
    (payment_token, payment): (SequenceToken, Result<PaymentSnapshot, ApiError>),
    (events_token, events): (SequenceToken, Result<serde_json::Value, ApiError>),
) -> Effects {
    let observed_status = payment.as_ref().ok().map(|s| s.aggregate.status);
    let observed_events = events.as_ref().ok().map(timeline::normalize);

    if accept(state, RequestKind::Payment, payment_token) {
        match payment {
            Ok(snapshot) => state.payment.apply_snapshot(snapshot),
            Err(error) => tracing::warn!(%error, "Reconciliation payment refresh failed"),
        }
    }
    if accept(state, RequestKind::Events, events_token) {
        match (&observed_events, events) {
            (Some(incoming), Ok(_)) => {
                state.timeline.events = timeline::merge(&state.timeline.events, incoming.clone());
                state.timeline.freshness = Freshness::Fresh;
            },
            (_, Err(error)) => tracing::warn!(%error, "Reconciliation events refresh failed"),
            (None, Ok(_)) => {},
        }
    }

    if !state.payment.reconciliation.is_live(generation) {
        return smallvec![Effect::None];
    }

    let reconciliation = &state.payment.reconciliation;
    let expected_seen = observed_events
        .as_deref()
        .is_some_and(|events| timeline::contains_type(events, &reconciliation.expected_event_type));
    let elapsed = reconciliation
        .started_at
        .and_then(|started| (env.clock().now() - started).to_std().ok())
        .unwrap_or_default();

    let reason = match observed_status {
        Some(status) if status.is_terminal() => Some(StopReason::TerminalStatus(status)),
        _ if expected_seen => Some(StopReason::ExpectedEvent),
        _ if elapsed > reconciliation.timeout => Some(StopReason::TimedOut),
        _ => None,
    };

    match reason {
        Some(reason) => {
            finish(state, reason);
            let mut effects: Effects = smallvec![Effect::Cancel(RECONCILIATION_EFFECT.into())];
            if reason != StopReason::TimedOut {
                effects.push(fetch(state, env, RequestKind::Ledger));
            }
            effects
        },
        None => smallvec![Effect::None],
    }
}

fn finish(state: &mut BookingViewState, reason: StopReason) {
    let reconciliation = &mut state.payment.reconciliation;
    reconciliation.phase = ReconciliationPhase::Finished(reason);
    metrics::counter!("booking.reconciliation.stopped", "reason" => reason.as_str()).increment(1);
    tracing::info!(
        generation = reconciliation.generation,
        ticks = reconciliation.ticks,
        reason = reason.as_str(),
        "Payment reconciliation stopped"
    );

    match reason {
        StopReason::TimedOut => {
            if let Some(booking_id) = state.booking_id.clone() {
                state.notice = Some(Notice::ReconciliationPending { booking_id });
            }
        },
        StopReason::TerminalStatus(status) => {
            state.notice = Some(Notice::PaymentReconciled {
                status: Some(status),
            });
        },
        StopReason::ExpectedEvent => {
            state.notice = Some(Notice::PaymentReconciled {
                status: state.payment.aggregate.as_ref().map(|a| a.status),
            });
        },
        StopReason::Stopped => {},
    }
}
