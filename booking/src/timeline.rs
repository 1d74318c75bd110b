//! Normalization of the booking audit log.
//!
//! The events endpoint returns records written by several producers over the
//! years (booking service, payment webhooks, back-office tools), so field
//! names vary. [`normalize`] maps them onto one [`TimelineEvent`] shape with a
//! deterministic id and sorts them by time.

use crate::types::Money;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Type assigned to records that carry none.
pub const UNTYPED_EVENT: &str = "event";

/// One normalized audit-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Stable identity across fetches
    pub id: String,
    /// Event type, e.g. `payment.captured`
    #[serde(rename = "type")]
    pub event_type: String,
    /// When it happened; `None` sorts first
    pub occurred_at: Option<DateTime<Utc>>,
    /// Free-form metadata
    pub meta: Map<String, Value>,
    /// Author, as sent by the server
    pub created_by: Option<Value>,
    /// State before the change
    pub before: Option<Value>,
    /// State after the change
    pub after: Option<Value>,
}

/// Display details pulled out of an event's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    /// Who did it
    pub actor: Option<String>,
    /// Amount involved
    pub amount: Option<Money>,
    /// Reason or note
    pub reason: Option<String>,
    /// Request, amendment or idempotency id tying the event to a mutation
    pub correlation_id: Option<String>,
}

impl TimelineEvent {
    fn sort_key(&self) -> i64 {
        self.occurred_at.map_or(0, |t| t.timestamp_millis())
    }

    /// Extract display details; every field is optional.
    #[must_use]
    pub fn details(&self) -> EventDetails {
        let actor = first_string(&self.meta, &["actor", "actor_name", "user"])
            .or_else(|| self.created_by.as_ref().and_then(person_name));

        let amount = self.meta.get("amount").and_then(|amount| {
            let currency = self.meta.get("currency")?.as_str()?;
            Money::from_json(amount, currency)
        });

        EventDetails {
            actor,
            amount,
            reason: first_string(&self.meta, &["reason", "note"]),
            correlation_id: first_string(
                &self.meta,
                &["request_id", "correlation_id", "amend_id", "idempotency_key"],
            ),
        }
    }
}

/// Normalize a raw events payload.
///
/// Accepts an array of records or an object with an `items` array. Anything
/// else, and any non-object record, is ignored.
#[must_use]
pub fn normalize(raw: &Value) -> Vec<TimelineEvent> {
    let records = match raw {
        Value::Array(records) => records.as_slice(),
        Value::Object(object) => match object.get("items") {
            Some(Value::Array(records)) => records.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut events: Vec<TimelineEvent> = records
        .iter()
        .filter_map(Value::as_object)
        .map(|record| normalize_record(record, &mut seen))
        .collect();

    sort(&mut events);
    events
}

/// Union two normalized timelines by id, `incoming` replacing `existing`.
#[must_use]
pub fn merge(existing: &[TimelineEvent], incoming: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    let incoming_ids: std::collections::HashSet<&str> =
        incoming.iter().map(|e| e.id.as_str()).collect();

    let mut merged: Vec<TimelineEvent> = existing
        .iter()
        .filter(|e| !incoming_ids.contains(e.id.as_str()))
        .cloned()
        .collect();
    merged.extend(incoming);

    sort(&mut merged);
    merged
}

/// `true` if any event has the given type.
#[must_use]
pub fn contains_type(events: &[TimelineEvent], event_type: &str) -> bool {
    events.iter().any(|e| e.event_type == event_type)
}

fn sort(events: &mut [TimelineEvent]) {
    // stable: ties keep input order
    events.sort_by_key(TimelineEvent::sort_key);
}

fn normalize_record(record: &Map<String, Value>, seen: &mut HashMap<String, usize>) -> TimelineEvent {
    let event_type = first_string(record, &["type", "event", "event_type"])
        .unwrap_or_else(|| UNTYPED_EVENT.to_string());

    let occurred_at = ["occurred_at", "created_at"]
        .iter()
        .find_map(|field| record.get(*field).filter(|v| !v.is_null()))
        .and_then(parse_instant);

    let id = explicit_id(record).unwrap_or_else(|| {
        let stamp = occurred_at.map_or_else(
            || "none".to_string(),
            |t| t.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        let composite = format!("{event_type}@{stamp}");
        let count = seen.entry(composite.clone()).or_insert(0);
        *count += 1;
        if *count == 1 { composite } else { format!("{composite}#{count}") }
    });

    let meta = ["meta", "metadata"]
        .iter()
        .find_map(|field| record.get(*field).and_then(Value::as_object))
        .cloned()
        .unwrap_or_default();

    TimelineEvent {
        id,
        event_type,
        occurred_at,
        meta,
        created_by: record.get("created_by").filter(|v| !v.is_null()).cloned(),
        before: record.get("before").filter(|v| !v.is_null()).cloned(),
        after: record.get("after").filter(|v| !v.is_null()).cloned(),
    }
}

fn explicit_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}

fn first_string(map: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match map.get(*field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => map.get(*field).and_then(person_name),
        _ => None,
    })
}

fn person_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(o) => ["name", "email", "id"]
            .iter()
            .find_map(|k| o.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn accepts_array_and_items_object() {
        let records = json!([{ "id": "e1", "type": "booking.created" }]);
        assert_eq!(normalize(&records).len(), 1);
        assert_eq!(normalize(&json!({ "items": records })).len(), 1);
    }

    #[test]
    fn other_shapes_yield_empty() {
        assert!(normalize(&json!(null)).is_empty());
        assert!(normalize(&json!("events")).is_empty());
        assert!(normalize(&json!({ "data": [] })).is_empty());
        assert!(normalize(&json!({ "items": "nope" })).is_empty());
        assert!(normalize(&json!([1, "two", null])).is_empty());
    }

    #[test]
    fn field_fallbacks() {
        let events = normalize(&json!([
            {
                "id": 42,
                "event_type": "payment.captured",
                "created_at": "2025-01-01T10:00:00Z",
                "metadata": { "amount": 45, "currency": "EUR" },
                "created_by": "webhook",
            },
            { "event": "note.added", "occurred_at": 1_735_725_600_000_i64 },
        ]));

        assert_eq!(events[0].id, "42");
        assert_eq!(events[0].event_type, "payment.captured");
        assert_eq!(
            events[0].occurred_at.map(|t| t.to_rfc3339()),
            Some("2025-01-01T10:00:00+00:00".to_string())
        );
        assert_eq!(events[0].meta.get("currency"), Some(&json!("EUR")));
        assert_eq!(events[0].created_by, Some(json!("webhook")));

        assert_eq!(events[1].event_type, "note.added");
        assert_eq!(events[1].id, "note.added@2025-01-01T10:00:00.000Z");
        assert!(events[1].meta.is_empty());
    }

    #[test]
    fn untyped_and_untimed_records() {
        let events = normalize(&json!([{ "occurred_at": "yesterday" }]));
        assert_eq!(events[0].event_type, "event");
        assert_eq!(events[0].occurred_at, None);
        assert_eq!(events[0].id, "event@none");
    }

    #[test]
    fn repeated_composites_get_suffixes_in_input_order() {
        let payload = json!([
            { "type": "note.added", "meta": { "note": "first" } },
            { "type": "note.added", "meta": { "note": "second" } },
            { "type": "note.added", "meta": { "note": "third" } },
        ]);
        let ids: Vec<_> = normalize(&payload).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["note.added@none", "note.added@none#2", "note.added@none#3"]);

        let again: Vec<_> = normalize(&payload).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn missing_timestamps_sort_first() {
        let events = normalize(&json!([
            { "id": "b", "occurred_at": "2025-01-02T00:00:00Z" },
            { "id": "a", "occurred_at": "2025-01-01T00:00:00Z" },
            { "id": "none" },
        ]));
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["none", "a", "b"]);
    }

    #[test]
    fn merge_prefers_incoming() {
        let existing = normalize(&json!([
            { "id": "a", "type": "payment.pending", "occurred_at": "2025-01-01T00:00:00Z" },
            { "id": "b", "type": "note.added", "occurred_at": "2025-01-01T01:00:00Z" },
        ]));
        let incoming = normalize(&json!([
            { "id": "a", "type": "payment.captured", "occurred_at": "2025-01-01T00:00:00Z" },
            { "id": "c", "type": "refund.issued", "occurred_at": "2024-12-31T00:00:00Z" },
        ]));

        let merged = merge(&existing, incoming);
        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(merged[1].event_type, "payment.captured");
        assert!(contains_type(&merged, "refund.issued"));
    }

    #[test]
    fn details_extraction() {
        let events = normalize(&json!([{
            "id": "e1",
            "type": "booking.cancelled",
            "meta": {
                "actor_name": "Ada",
                "amount": "80.00",
                "currency": "EUR",
                "note": "guest request",
                "amend_id": "am_1",
            },
        }]));
        let details = events[0].details();
        assert_eq!(details.actor.as_deref(), Some("Ada"));
        assert_eq!(details.amount, Some(Money::from_minor(8000, "EUR")));
        assert_eq!(details.reason.as_deref(), Some("guest request"));
        assert_eq!(details.correlation_id.as_deref(), Some("am_1"));
    }

    #[test]
    fn details_tolerate_missing_fields() {
        let events = normalize(&json!([{
            "id": "e1",
            "meta": { "amount": 10 },
            "created_by": { "email": "ops@example.test" },
        }]));
        let details = events[0].details();
        assert_eq!(details.actor.as_deref(), Some("ops@example.test"));
        assert_eq!(details.amount, None);
        assert_eq!(details.reason, None);
        assert_eq!(details.correlation_id, None);
    }

    proptest! {
        #[test]
        fn output_is_sorted_with_stable_ties(
            stamps in proptest::collection::vec(proptest::option::of(0i64..5), 0..30)
        ) {
            let records: Vec<Value> = stamps
                .iter()
                .enumerate()
                .map(|(i, stamp)| match stamp {
                    Some(minute) => json!({ "id": i, "occurred_at": minute * 60_000 }),
                    None => json!({ "id": i }),
                })
                .collect();

            let events = normalize(&Value::Array(records));
            prop_assert_eq!(events.len(), stamps.len());

            for pair in events.windows(2) {
                let (left, right) = (&pair[0], &pair[1]);
                prop_assert!(left.sort_key() <= right.sort_key());
                if left.sort_key() == right.sort_key() {
                    let l: usize = left.id.parse().unwrap();
                    let r: usize = right.id.parse().unwrap();
                    prop_assert!(l < r, "tie broken out of input order");
                }
            }
        }
    }
}
