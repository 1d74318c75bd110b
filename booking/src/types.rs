//! Core domain types for the booking console.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a booking in the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    /// Wrap a backend booking id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued identifier of an accepted amendment quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmendId(String);

impl AmendId {
    /// Wrap a server amend id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AmendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processor payment intent created before a capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIntentId(String);

impl PaymentIntentId {
    /// Wrap a processor intent id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated correlation id binding amendment quotes to their confirm.
///
/// One id is generated per editing session and reused for every quote in
/// that session so the backend can deduplicate retried quote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Not yet submitted
    Draft,
    /// Awaiting supplier confirmation
    Pending,
    /// Confirmed by the supplier; the only status that may be amended or cancelled
    Confirmed,
    /// Cancelled
    #[serde(alias = "canceled")]
    Cancelled,
    /// Stay completed
    Completed,
    /// Rejected by the supplier
    Rejected,
}

impl BookingStatus {
    /// Parse a loosely-typed status string from a mutation response.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Check-in / check-out pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDates {
    /// Arrival date
    pub check_in: NaiveDate,
    /// Departure date
    pub check_out: NaiveDate,
}

impl StayDates {
    /// Number of nights; zero or negative for an invalid range.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Monetary amount in integer minor units.
///
/// All currencies are treated as having two minor digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (cents)
    pub minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Money {
    /// Create from minor units.
    #[must_use]
    pub fn from_minor(minor: i64, currency: impl Into<String>) -> Self {
        Self {
            minor,
            currency: currency.into(),
        }
    }

    /// Parse a decimal amount in major units (`"45"`, `"45.5"`, `"-12.50"`).
    ///
    /// Returns `None` for anything that is not a plain decimal with at most
    /// two fraction digits.
    #[must_use]
    pub fn parse(input: &str, currency: impl Into<String>) -> Option<Self> {
        parse_minor(input).map(|minor| Self::from_minor(minor, currency))
    }

    /// Read an amount from a loosely-typed JSON value (number or numeric string).
    #[must_use]
    pub fn from_json(value: &serde_json::Value, currency: impl Into<String>) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Self::parse(&n.to_string(), currency),
            serde_json::Value::String(s) => Self::parse(s, currency),
            _ => None,
        }
    }

    /// `true` if the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Absolute value in the same currency.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self::from_minor(self.minor.abs(), self.currency.clone())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

fn parse_minor(input: &str) -> Option<i64> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut cents: i64 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    if fraction.len() == 1 {
        cents *= 10;
    }

    let minor = whole.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -minor } else { minor })
}

/// The booking snapshot cached by the console.
///
/// Replaced wholesale on every successful fetch. The only local mutation is
/// [`Booking::apply_confirmed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identity
    pub id: BookingId,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Arrival date
    pub check_in: NaiveDate,
    /// Departure date
    pub check_out: NaiveDate,
    /// Total price in minor units
    pub total_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl Booking {
    /// Current stay dates.
    #[must_use]
    pub const fn stay(&self) -> StayDates {
        StayDates {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    /// Booking total.
    #[must_use]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor, self.currency.clone())
    }

    /// Apply a change the server has confirmed in a mutation response.
    pub fn apply_confirmed(&mut self, change: &ConfirmedChange) {
        self.status = change.status;
    }
}

/// Fields of the booking snapshot a mutation response has confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedChange {
    /// Status reported by the server
    pub status: BookingStatus,
}

/// Payment processor status of the booking's payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
    /// Needs a new payment method (terminal from the console's point of view)
    RequiresPaymentMethod,
    /// Awaiting confirmation
    RequiresConfirmation,
    /// Awaiting customer action (3DS etc.)
    RequiresAction,
    /// Processing at the processor
    Processing,
    /// Authorized, awaiting capture
    RequiresCapture,
    /// Cancelled at the processor
    #[serde(alias = "cancelled")]
    Canceled,
    /// Funds captured
    Succeeded,
    /// Failed
    Failed,
    /// Anything this client does not know about
    #[serde(other)]
    Unknown,
}

impl ProcessorStatus {
    /// Statuses after which no further transition is expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Canceled | Self::Failed | Self::RequiresPaymentMethod
        )
    }
}

/// Server-computed payment summary. Never mutated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAggregate {
    /// Amount due, minor units
    pub total_minor: i64,
    /// Amount paid, minor units
    pub paid_minor: i64,
    /// Amount refunded, minor units
    pub refunded_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Processor status
    pub status: ProcessorStatus,
}

/// One entry of the payment transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Transaction id
    pub id: String,
    /// Kind, e.g. `capture` or `refund`
    pub kind: String,
    /// Amount, minor units
    pub amount_minor: i64,
    /// Processor status string
    pub status: String,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of `GetPaymentState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// The aggregate
    pub aggregate: PaymentAggregate,
    /// Transaction history
    #[serde(default)]
    pub transactions: Vec<PaymentTransaction>,
}

/// Response of `CapturePayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureAck {
    /// Intent that was captured
    pub intent_id: PaymentIntentId,
    /// Processor status reported synchronously, if any
    #[serde(default)]
    pub status: Option<String>,
}

/// Financial reconciliation snapshot returned by `GetLedgerSummary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Amount due, minor units
    pub total_minor: i64,
    /// Amount paid, minor units
    pub paid_minor: i64,
    /// Amount refunded, minor units
    pub refunded_minor: i64,
    /// Outstanding balance, minor units
    pub balance_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Any other fields the server sends
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Before/after snapshot of one side of an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaySnapshot {
    /// Arrival date
    pub check_in: NaiveDate,
    /// Departure date
    pub check_out: NaiveDate,
    /// Price for this stay, minor units
    pub total_minor: i64,
}

impl StaySnapshot {
    /// Dates of this snapshot.
    #[must_use]
    pub const fn stay(&self) -> StayDates {
        StayDates {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}

/// Result of a quote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentProposal {
    /// Server-issued id to confirm against
    pub amend_id: AmendId,
    /// Correlation id the quote was requested with
    pub request_id: CorrelationId,
    /// Current stay
    pub before: StaySnapshot,
    /// Proposed stay (the server may have adjusted the requested dates)
    pub after: StaySnapshot,
    /// Signed price difference, minor units
    pub delta_minor: i64,
    /// Currency of the delta
    pub currency: String,
}

impl AmendmentProposal {
    /// Classified price impact.
    #[must_use]
    pub fn price_delta(&self) -> PriceDelta {
        PriceDelta::from_minor(self.delta_minor, &self.currency)
    }
}

/// Result of a confirm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentConfirmation {
    /// Booking status after the amendment
    pub status: String,
    /// Final delta, minor units, when the server reports one
    #[serde(default)]
    pub delta_minor: Option<i64>,
    /// Currency of the final delta
    #[serde(default)]
    pub currency: Option<String>,
}

/// Price impact of an amendment.
///
/// Kept as three cases so "no change", "charge" and "refund" can each be
/// framed differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceDelta {
    /// The new stay costs the same
    NoChange,
    /// The guest pays this much more
    AdditionalCharge(Money),
    /// The guest is refunded this much
    Refund(Money),
}

impl PriceDelta {
    /// Classify a signed delta.
    #[must_use]
    pub fn from_minor(delta_minor: i64, currency: &str) -> Self {
        match delta_minor.signum() {
            0 => Self::NoChange,
            1 => Self::AdditionalCharge(Money::from_minor(delta_minor, currency)),
            _ => Self::Refund(Money::from_minor(delta_minor.saturating_abs(), currency)),
        }
    }

    /// Signed delta in minor units.
    #[must_use]
    pub const fn signed_minor(&self) -> i64 {
        match self {
            Self::NoChange => 0,
            Self::AdditionalCharge(m) => m.minor,
            Self::Refund(m) => -m.minor,
        }
    }

    /// Short user-facing description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::NoChange => "no price change".to_string(),
            Self::AdditionalCharge(m) => format!("additional charge {m}"),
            Self::Refund(m) => format!("refund {m}"),
        }
    }
}

/// Response of `CancelBooking`.
///
/// `refund` and `penalty` are loosely typed on the wire; use
/// [`CancellationOutcome::figures`] to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    /// Status after cancellation
    #[serde(default)]
    pub status: Option<String>,
    /// Refund amount in major units
    #[serde(default)]
    pub refund: Option<serde_json::Value>,
    /// Penalty amount in major units
    #[serde(default)]
    pub penalty: Option<serde_json::Value>,
    /// Currency of refund and penalty
    #[serde(default)]
    pub currency: Option<String>,
}

impl CancellationOutcome {
    /// Refund and penalty, only when both are present and numeric.
    #[must_use]
    pub fn figures(&self, fallback_currency: &str) -> Option<CancellationFigures> {
        let currency = self.currency.as_deref().unwrap_or(fallback_currency);
        let refund = Money::from_json(self.refund.as_ref()?, currency)?;
        let penalty = Money::from_json(self.penalty.as_ref()?, currency)?;
        Some(CancellationFigures { refund, penalty })
    }

    /// Status the server reports, defaulting to cancelled.
    #[must_use]
    pub fn confirmed_status(&self) -> BookingStatus {
        self.status
            .as_deref()
            .and_then(BookingStatus::parse)
            .unwrap_or(BookingStatus::Cancelled)
    }
}

/// Refund and penalty of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationFigures {
    /// Amount refunded to the guest
    pub refund: Money,
    /// Amount retained as a penalty
    pub penalty: Money,
}

/// Non-blocking messages for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// The capture went through but the processor has not confirmed it yet
    ReconciliationPending {
        /// Booking being reconciled
        booking_id: BookingId,
    },
    /// Payment reconciliation reached a terminal state
    PaymentReconciled {
        /// Final processor status, if observed
        status: Option<ProcessorStatus>,
    },
    /// A date amendment was confirmed
    AmendmentConfirmed {
        /// Price impact
        delta: PriceDelta,
    },
    /// The booking was cancelled
    BookingCancelled {
        /// Refund and penalty when the server reported both
        figures: Option<CancellationFigures>,
    },
}

impl Notice {
    /// User-facing text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ReconciliationPending { .. } => {
                "Payment captured. Confirmation from the payment processor has not arrived yet; \
                 the payment summary will update once it does."
                    .to_string()
            },
            Self::PaymentReconciled { status: Some(status) } => {
                format!("Payment status updated: {}", processor_status_label(*status))
            },
            Self::PaymentReconciled { status: None } => "Payment confirmed.".to_string(),
            Self::AmendmentConfirmed { delta } => {
                format!("Amendment confirmed: {}", delta.describe())
            },
            Self::BookingCancelled {
                figures: Some(CancellationFigures { refund, penalty }),
            } => format!("Booking cancelled. Refund {refund}, penalty {penalty}."),
            Self::BookingCancelled { figures: None } => "Booking cancelled.".to_string(),
        }
    }

    /// `true` for notices that tell the user something is still pending.
    #[must_use]
    pub const fn is_advisory(&self) -> bool {
        matches!(self, Self::ReconciliationPending { .. })
    }
}

const fn processor_status_label(status: ProcessorStatus) -> &'static str {
    match status {
        ProcessorStatus::RequiresPaymentMethod => "requires a new payment method",
        ProcessorStatus::RequiresConfirmation => "awaiting confirmation",
        ProcessorStatus::RequiresAction => "awaiting customer action",
        ProcessorStatus::Processing => "processing",
        ProcessorStatus::RequiresCapture => "authorized",
        ProcessorStatus::Canceled => "canceled",
        ProcessorStatus::Succeeded => "succeeded",
        ProcessorStatus::Failed => "failed",
        ProcessorStatus::Unknown => "unknown",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_parse_accepts_plain_decimals() {
        assert_eq!(Money::parse("45", "EUR").map(|m| m.minor), Some(4500));
        assert_eq!(Money::parse("45.5", "EUR").map(|m| m.minor), Some(4550));
        assert_eq!(Money::parse(" 45.05 ", "EUR").map(|m| m.minor), Some(4505));
        assert_eq!(Money::parse("-12.50", "EUR").map(|m| m.minor), Some(-1250));
        assert_eq!(Money::parse(".5", "EUR").map(|m| m.minor), Some(50));
    }

    #[test]
    fn money_parse_rejects_non_numeric() {
        for input in ["", ".", "abc", "12,50", "1.234", "1e3", "--1", "NaN", "12.5.0"] {
            assert!(Money::parse(input, "EUR").is_none(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_minor(4500, "EUR").to_string(), "45.00 EUR");
        assert_eq!(Money::from_minor(-1250, "USD").to_string(), "-12.50 USD");
        assert_eq!(Money::from_minor(7, "GBP").to_string(), "0.07 GBP");
    }

    #[test]
    fn money_from_json() {
        assert_eq!(Money::from_json(&json!(80), "EUR").map(|m| m.minor), Some(8000));
        assert_eq!(Money::from_json(&json!(19.9), "EUR").map(|m| m.minor), Some(1990));
        assert_eq!(Money::from_json(&json!("20.00"), "EUR").map(|m| m.minor), Some(2000));
        assert!(Money::from_json(&json!("n/a"), "EUR").is_none());
        assert!(Money::from_json(&json!(null), "EUR").is_none());
        assert!(Money::from_json(&json!({"amount": 1}), "EUR").is_none());
    }

    #[test]
    fn price_delta_trichotomy() {
        assert_eq!(PriceDelta::from_minor(0, "EUR"), PriceDelta::NoChange);
        assert_eq!(
            PriceDelta::from_minor(4500, "EUR").describe(),
            "additional charge 45.00 EUR"
        );
        assert_eq!(PriceDelta::from_minor(-1250, "EUR").describe(), "refund 12.50 EUR");
        assert_eq!(PriceDelta::NoChange.describe(), "no price change");
        assert_eq!(PriceDelta::from_minor(-1250, "EUR").signed_minor(), -1250);
    }

    #[test]
    fn processor_terminal_set() {
        assert!(ProcessorStatus::Succeeded.is_terminal());
        assert!(ProcessorStatus::Canceled.is_terminal());
        assert!(ProcessorStatus::Failed.is_terminal());
        assert!(ProcessorStatus::RequiresPaymentMethod.is_terminal());
        assert!(!ProcessorStatus::Processing.is_terminal());
        assert!(!ProcessorStatus::RequiresCapture.is_terminal());
        assert!(!ProcessorStatus::Unknown.is_terminal());
    }

    #[test]
    fn unknown_processor_status_decodes() {
        let status: ProcessorStatus = serde_json::from_value(json!("partially_funded")).unwrap();
        assert_eq!(status, ProcessorStatus::Unknown);
    }

    #[test]
    fn cancellation_figures_require_both_numeric() {
        let full = CancellationOutcome {
            status: Some("cancelled".into()),
            refund: Some(json!(80)),
            penalty: Some(json!("20.00")),
            currency: None,
        };
        let figures = full.figures("EUR").unwrap();
        assert_eq!(figures.refund, Money::from_minor(8000, "EUR"));
        assert_eq!(figures.penalty, Money::from_minor(2000, "EUR"));

        let missing = CancellationOutcome {
            penalty: None,
            ..full.clone()
        };
        assert!(missing.figures("EUR").is_none());

        let garbled = CancellationOutcome {
            refund: Some(json!("lots")),
            ..full
        };
        assert!(garbled.figures("EUR").is_none());
    }

    #[test]
    fn booking_status_parse_and_serde() {
        assert_eq!(BookingStatus::parse("Canceled"), Some(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::parse("nope"), None);
        let status: BookingStatus = serde_json::from_value(json!("confirmed")).unwrap();
        assert_eq!(status, BookingStatus::Confirmed);
    }

    #[test]
    fn notice_messages() {
        let notice = Notice::AmendmentConfirmed {
            delta: PriceDelta::from_minor(4500, "EUR"),
        };
        assert_eq!(notice.message(), "Amendment confirmed: additional charge 45.00 EUR");
        assert_eq!(
            Notice::BookingCancelled { figures: None }.message(),
            "Booking cancelled."
        );
        assert!(Notice::ReconciliationPending { booking_id: BookingId::new("b") }.is_advisory());
    }
}
