//! `reqwest` implementation of [`BookingApi`].

use super::{ApiFuture, ApiResult, BookingApi};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::idempotency::IdempotencyKey;
use crate::types::{
    AmendId, AmendmentConfirmation, AmendmentProposal, Booking, BookingId, CancellationOutcome,
    CaptureAck, CorrelationId, LedgerSummary, PaymentIntentId, PaymentSnapshot,
};
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// HTTP client for the booking REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for HttpBookingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBookingApi")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct QuoteRequest {
    check_in: NaiveDate,
    check_out: NaiveDate,
    request_id: CorrelationId,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    #[serde(alias = "id")]
    intent_id: PaymentIntentId,
}

impl HttpBookingApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the base URL is invalid or the TLS
    /// backend cannot be initialised.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::Transport(format!("invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!(
                "invalid base URL: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let url = self.url(segments)?;
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    fn call<T>(&self, request: ApiResult<RequestBuilder>) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        Box::pin(async move {
            let response = request?
                .send()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            decode(response).await
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "Booking API returned an error");
    Err(ApiError::from_status(status.as_u16(), error_message(&body)))
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|k| value.get(*k).and_then(serde_json::Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

impl BookingApi for HttpBookingApi {
    fn get_booking(&self, id: BookingId) -> ApiFuture<Booking> {
        self.call(self.request(Method::GET, &["bookings", id.as_str()]))
    }

    fn get_payment_state(&self, id: BookingId) -> ApiFuture<PaymentSnapshot> {
        self.call(self.request(Method::GET, &["bookings", id.as_str(), "payments"]))
    }

    fn get_events(&self, id: BookingId) -> ApiFuture<serde_json::Value> {
        self.call(self.request(Method::GET, &["bookings", id.as_str(), "events"]))
    }

    fn quote_amendment(
        &self,
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        request_id: CorrelationId,
    ) -> ApiFuture<AmendmentProposal> {
        let request = self
            .request(Method::POST, &["bookings", id.as_str(), "amendments", "quote"])
            .map(|builder| {
                builder
                    .header(REQUEST_ID_HEADER, request_id.to_string())
                    .json(&QuoteRequest {
                        check_in,
                        check_out,
                        request_id,
                    })
            });
        self.call(request)
    }

    fn confirm_amendment(
        &self,
        id: BookingId,
        amend_id: AmendId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<AmendmentConfirmation> {
        let request = self
            .request(
                Method::POST,
                &["bookings", id.as_str(), "amendments", amend_id.as_str(), "confirm"],
            )
            .map(|builder| {
                builder
                    .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
                    .json(&json!({}))
            });
        self.call(request)
    }

    fn create_payment_intent(
        &self,
        id: BookingId,
        amount_minor: i64,
        currency: String,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<PaymentIntentId> {
        let request = self
            .request(Method::POST, &["bookings", id.as_str(), "payment-intents"])
            .map(|builder| {
                builder
                    .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
                    .json(&json!({ "amount_minor": amount_minor, "currency": currency }))
            });
        let response: ApiFuture<PaymentIntentResponse> = self.call(request);
        Box::pin(async move { response.await.map(|r| r.intent_id) })
    }

    fn capture_payment(
        &self,
        intent_id: PaymentIntentId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CaptureAck> {
        let request = self
            .request(Method::POST, &["payment-intents", intent_id.as_str(), "capture"])
            .map(|builder| {
                builder
                    .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
                    .json(&json!({}))
            });
        self.call(request)
    }

    fn cancel_booking(
        &self,
        id: BookingId,
        idempotency_key: IdempotencyKey,
    ) -> ApiFuture<CancellationOutcome> {
        let request = self
            .request(Method::POST, &["bookings", id.as_str(), "cancel"])
            .map(|builder| {
                builder
                    .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
                    .json(&json!({}))
            });
        self.call(request)
    }

    fn get_ledger_summary(&self, id: BookingId) -> ApiFuture<LedgerSummary> {
        self.call(self.request(Method::GET, &["bookings", id.as_str(), "ledger"]))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            token: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn urls_are_built_from_encoded_segments() {
        let api = HttpBookingApi::new(&config("https://api.example.test/v1/")).unwrap();
        let url = api.url(&["bookings", "bk 1/2", "events"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.test/v1/bookings/bk%201%2F2/events");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpBookingApi::new(&config("not a url")),
            Err(ApiError::Transport(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let api = HttpBookingApi::new(&config("https://api.example.test")).unwrap();
        let debug = format!("{api:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message":"amendment expired"}"#), "amendment expired");
        assert_eq!(error_message(r#"{"error":"bad dates"}"#), "bad dates");
        assert_eq!(error_message("  plain text  "), "plain text");
    }
}
