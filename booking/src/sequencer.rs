//! Per-resource request sequencing.
//!
//! Every asynchronous fetch takes a [`SequenceToken`] before it starts. When
//! the response arrives the reducer asks [`RequestSequencer::is_current`]; a
//! response whose token has been superseded is dropped without touching
//! state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Value of a sequence counter at the time a request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceToken(u64);

impl SequenceToken {
    /// Raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical resources of the booking console that are fetched or mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestKind {
    /// The booking snapshot
    Booking,
    /// Payment aggregate and transactions
    Payment,
    /// Raw event timeline
    Events,
    /// Ledger summary
    Ledger,
    /// Amendment quote
    AmendmentQuote,
    /// Amendment confirm
    AmendmentConfirm,
    /// Payment intent + capture
    Capture,
    /// Booking cancellation
    Cancellation,
}

impl RequestKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Payment => "payment",
            Self::Events => "events",
            Self::Ledger => "ledger",
            Self::AmendmentQuote => "amendment_quote",
            Self::AmendmentConfirm => "amendment_confirm",
            Self::Capture => "capture",
            Self::Cancellation => "cancellation",
        }
    }
}

/// Monotonic counters keyed by resource.
///
/// Counters only ever grow, so a token handed out before an invalidation can
/// never compare equal again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSequencer<K: Eq + Hash> {
    counters: HashMap<K, u64>,
}

impl<K: Eq + Hash> Default for RequestSequencer<K> {
    fn default() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }
}

impl<K> RequestSequencer<K>
where
    K: Eq + Hash,
{
    /// Empty sequencer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request for `key`, superseding any earlier one.
    pub fn begin(&mut self, key: K) -> SequenceToken {
        let counter = self.counters.entry(key).or_insert(0);
        *counter += 1;
        SequenceToken(*counter)
    }

    /// `true` if `token` belongs to the latest request for `key`.
    #[must_use]
    pub fn is_current(&self, key: &K, token: SequenceToken) -> bool {
        self.counters.get(key).is_some_and(|current| *current == token.0)
    }

    /// Supersede the in-flight request for `key`, if any.
    pub fn invalidate(&mut self, key: K) {
        *self.counters.entry(key).or_insert(0) += 1;
    }

    /// Supersede every in-flight request.
    pub fn invalidate_all(&mut self) {
        for counter in self.counters.values_mut() {
            *counter += 1;
        }
    }

    /// Latest counter value for `key` (zero if never used).
    #[must_use]
    pub fn current(&self, key: &K) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn begin_supersedes_previous() {
        let mut sequencer = RequestSequencer::new();
        let first = sequencer.begin(RequestKind::Booking);
        let second = sequencer.begin(RequestKind::Booking);

        assert!(!sequencer.is_current(&RequestKind::Booking, first));
        assert!(sequencer.is_current(&RequestKind::Booking, second));
    }

    #[test]
    fn keys_are_independent() {
        let mut sequencer = RequestSequencer::new();
        let booking = sequencer.begin(RequestKind::Booking);
        let _events = sequencer.begin(RequestKind::Events);
        let _events = sequencer.begin(RequestKind::Events);

        assert!(sequencer.is_current(&RequestKind::Booking, booking));
    }

    #[test]
    fn invalidate_drops_in_flight() {
        let mut sequencer = RequestSequencer::new();
        let token = sequencer.begin(RequestKind::Payment);
        sequencer.invalidate(RequestKind::Payment);
        assert!(!sequencer.is_current(&RequestKind::Payment, token));

        let next = sequencer.begin(RequestKind::Payment);
        assert!(next.value() > token.value());
        assert!(sequencer.is_current(&RequestKind::Payment, next));
    }

    #[test]
    fn invalidate_all_never_resets() {
        let mut sequencer = RequestSequencer::new();
        let booking = sequencer.begin(RequestKind::Booking);
        let ledger = sequencer.begin(RequestKind::Ledger);
        sequencer.invalidate_all();

        assert!(!sequencer.is_current(&RequestKind::Booking, booking));
        assert!(!sequencer.is_current(&RequestKind::Ledger, ledger));
        assert_eq!(sequencer.current(&RequestKind::Booking), 2);
        assert_eq!(sequencer.begin(RequestKind::Booking).value(), 3);
    }

    #[test]
    fn unknown_key_is_never_current() {
        let sequencer: RequestSequencer<RequestKind> = RequestSequencer::new();
        let mut other = RequestSequencer::new();
        let token = other.begin(RequestKind::Booking);
        assert!(!sequencer.is_current(&RequestKind::Booking, token));
    }

    proptest! {
        #[test]
        fn only_the_latest_overlapping_fetch_applies(
            order in (1usize..12).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let mut sequencer = RequestSequencer::new();
            let tokens: Vec<_> = order.iter().map(|_| sequencer.begin(RequestKind::Events)).collect();

            let applied: Vec<usize> = order
                .iter()
                .copied()
                .filter(|&i| sequencer.is_current(&RequestKind::Events, tokens[i]))
                .collect();

            prop_assert_eq!(applied, vec![tokens.len() - 1]);
        }

        #[test]
        fn interleaved_begins_track_the_live_counter(
            steps in proptest::collection::vec(any::<bool>(), 1..40)
        ) {
            // true = begin a new request, false = complete the oldest outstanding one
            let mut sequencer = RequestSequencer::new();
            let mut outstanding = std::collections::VecDeque::new();
            let mut latest = None;

            for begin in steps {
                if begin || outstanding.is_empty() {
                    let token = sequencer.begin(RequestKind::Payment);
                    outstanding.push_back(token);
                    latest = Some(token);
                } else if let Some(token) = outstanding.pop_front() {
                    prop_assert_eq!(
                        sequencer.is_current(&RequestKind::Payment, token),
                        Some(token) == latest
                    );
                }
            }
        }
    }
}
