//! Idempotency keys for mutating backend calls.
//!
//! A key is derived from `resource|action|amount|bucket`, where `bucket` is
//! the current instant divided into fixed windows. Retries of the same
//! logical action inside one window share a key, so the backend collapses
//! them; once the window rolls over the same action gets a fresh key.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const KEY_PREFIX: &str = "idem_";

/// An `Idempotency-Key` header value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Borrow the header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutations that carry an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Confirming a quoted amendment
    AmendmentConfirm,
    /// Creating a payment intent before capture
    PaymentIntentCreate,
    /// Capturing a payment intent
    PaymentCapture,
    /// Cancelling a booking
    BookingCancel,
}

impl MutationKind {
    /// Action label mixed into the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AmendmentConfirm => "amendment.confirm",
            Self::PaymentIntentCreate => "payment_intent.create",
            Self::PaymentCapture => "payment.capture",
            Self::BookingCancel => "booking.cancel",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives time-bucketed idempotency keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyKeyGenerator {
    window_ms: i64,
}

impl IdempotencyKeyGenerator {
    /// Generator with the given bucket width. Sub-millisecond windows are
    /// widened to one millisecond.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX).max(1);
        Self { window_ms }
    }

    /// Bucket width.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.unsigned_abs())
    }

    /// Bucket index of `now`.
    #[must_use]
    pub fn bucket(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().div_euclid(self.window_ms)
    }

    /// Key for `action` on `resource_id` with the given amount at instant `now`.
    #[must_use]
    pub fn generate(
        &self,
        resource_id: &str,
        action: MutationKind,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> IdempotencyKey {
        let material = format!(
            "{resource_id}|{}|{amount_minor}|{}",
            action.as_str(),
            self.bucket(now)
        );
        IdempotencyKey(format!("{KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(material)))
    }
}

impl Default for IdempotencyKeyGenerator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    #[test]
    fn same_bucket_same_key() {
        let generator = IdempotencyKeyGenerator::default();
        let base = 1_735_689_600_000;
        let first = generator.generate("bk_1", MutationKind::AmendmentConfirm, 4500, at_ms(base));
        let retry = generator.generate(
            "bk_1",
            MutationKind::AmendmentConfirm,
            4500,
            at_ms(base + 29_999),
        );
        assert_eq!(first, retry);
    }

    #[test]
    fn next_bucket_new_key() {
        let generator = IdempotencyKeyGenerator::default();
        let base = 1_735_689_600_000;
        let first = generator.generate("bk_1", MutationKind::BookingCancel, 0, at_ms(base));
        let later = generator.generate("bk_1", MutationKind::BookingCancel, 0, at_ms(base + 30_000));
        assert_ne!(first, later);
    }

    #[test]
    fn every_input_participates() {
        let generator = IdempotencyKeyGenerator::default();
        let now = at_ms(1_735_689_600_000);
        let key = generator.generate("bk_1", MutationKind::PaymentCapture, 100, now);
        assert_ne!(key, generator.generate("bk_2", MutationKind::PaymentCapture, 100, now));
        assert_ne!(key, generator.generate("bk_1", MutationKind::PaymentIntentCreate, 100, now));
        assert_ne!(key, generator.generate("bk_1", MutationKind::PaymentCapture, 101, now));
    }

    #[test]
    fn key_format() {
        let generator = IdempotencyKeyGenerator::default();
        let key = generator.generate("bk_1", MutationKind::AmendmentConfirm, -1250, at_ms(60_000));
        let encoded = key.as_str().strip_prefix("idem_").unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "bk_1|amendment.confirm|-1250|2"
        );
        assert!(
            key.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        );
    }

    #[test]
    fn pre_epoch_buckets_are_euclidean() {
        let generator = IdempotencyKeyGenerator::new(Duration::from_secs(30));
        assert_eq!(generator.bucket(at_ms(-1)), -1);
        assert_eq!(generator.bucket(at_ms(-30_000)), -1);
        assert_eq!(generator.bucket(at_ms(-30_001)), -2);
        assert_eq!(generator.bucket(at_ms(0)), 0);
    }

    #[test]
    fn zero_window_is_widened() {
        let generator = IdempotencyKeyGenerator::new(Duration::ZERO);
        assert_eq!(generator.window(), Duration::from_millis(1));
    }
}
