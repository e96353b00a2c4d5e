//! Client for the travel backend's search, booking and subscription endpoints.
//!
//! Search failures are reported to the caller. Booking and subscription
//! calls are best-effort: a failure is logged and the caller carries on with
//! local state only.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::mirror::{normalize_base_url, parse_api_error, MirrorError};
use crate::models::{CandidateRecord, Record, RecordKind};
use crate::util::{json_number, json_text};

const DEFAULT_RATING: f64 = 4.2;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(String),
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One search hit, normalized from whatever shape the backend returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub kind: String,
    pub city: String,
    pub title: String,
    pub price: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub rating: f64,
    pub category: String,
    pub airline: String,
}

impl SearchResult {
    /// Candidate for saving this hit as a deal.
    pub fn to_candidate(&self) -> CandidateRecord {
        CandidateRecord::new()
            .with_id(self.id.clone())
            .kind(RecordKind::Deal)
            .city(self.city.clone())
            .title(self.title.clone())
            .price(self.price.clone())
    }
}

/// Body for `POST /api/bookings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub id: String,
    pub kind: String,
    pub city: String,
    pub title: String,
    pub price: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl BookingRequest {
    pub fn for_record(record: &Record, details: Map<String, Value>) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind.as_str().to_string(),
            city: record.display_label.clone(),
            title: record.title.clone(),
            price: record.price_label.clone(),
            user_id: record.owner_id.clone(),
            details,
        }
    }
}

/// Body for `POST /api/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub email: String,
    pub plan: String,
    pub method: String,
}

#[derive(Clone, Debug)]
pub struct TravelApiClient {
    base_url: String,
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl TravelApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into()).map_err(|error| match error {
            MirrorError::InvalidConfiguration(message) => ApiError::InvalidConfiguration(message),
            other => ApiError::InvalidConfiguration(other.to_string()),
        })?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(timeout).build()?,
            auth_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = crate::util::normalize_text_option(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/search?from=&tab=`.
    pub async fn search(&self, from: &str, tab: &str) -> ApiResult<Vec<SearchResult>> {
        let url = format!(
            "{}/api/search?from={}&tab={}",
            self.base_url,
            urlencoding::encode(from),
            urlencoding::encode(tab)
        );
        let response = self.authorized(self.client.get(url)).send().await?;
        let body = read_success_body(response).await?;
        Ok(normalize_search_results(body.unwrap_or(Value::Null), tab))
    }

    /// Best-effort `POST /api/bookings`; `None` when the backend is unavailable.
    pub async fn create_booking(&self, booking: &BookingRequest) -> Option<Value> {
        match self.post_json("/api/bookings", booking).await {
            Ok(created) => created,
            Err(error) => {
                tracing::warn!("Could not save booking to server; continuing locally: {}", error);
                None
            }
        }
    }

    /// Best-effort `POST /api/subscribe`; `None` when the backend is unavailable.
    pub async fn subscribe(&self, request: &SubscriptionRequest) -> Option<Value> {
        match self.post_json("/api/subscribe", request).await {
            Ok(created) => created,
            Err(error) => {
                tracing::warn!("Subscribe request failed: {}", error);
                None
            }
        }
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> ApiResult<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .await?;
        read_success_body(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn read_success_body(response: reqwest::Response) -> ApiResult<Option<Value>> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Api(parse_api_error(status, &body)));
    }
    if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        return Ok(None);
    }
    if is_json {
        Ok(Some(serde_json::from_str(&body).map_err(|error| {
            ApiError::Api(format!("invalid JSON response: {error}"))
        })?))
    } else {
        Ok(Some(Value::String(body)))
    }
}

/// Normalize a raw search response. Anything but an array yields no results.
pub fn normalize_search_results(body: Value, tab: &str) -> Vec<SearchResult> {
    let Value::Array(items) = body else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.as_object().map(|fields| (index, fields)))
        .map(|(index, fields)| normalize_search_item(fields, tab, index))
        .collect()
}

fn normalize_search_item(fields: &Map<String, Value>, tab: &str, index: usize) -> SearchResult {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(json_text)
            .filter(|value| !value.is_empty())
    };
    let number = |key: &str| fields.get(key).and_then(json_number);

    let kind = text("kind").unwrap_or_else(|| tab.to_string());
    let city = text("city").or_else(|| text("title")).unwrap_or_default();
    let title = text("title").unwrap_or_else(|| {
        if fields.contains_key("kind") {
            format!("{kind} in {city}")
        } else {
            city.clone()
        }
    });
    let id = text("id").or_else(|| text("bookingId")).unwrap_or_else(|| {
        let initial = kind
            .chars()
            .next()
            .map_or('X', |c| c.to_ascii_uppercase());
        format!("{initial}{}", index + 1)
    });
    let price = text("price").unwrap_or_else(|| {
        text("total").map_or_else(|| "$0".to_string(), |total| format!("${total}"))
    });

    SearchResult {
        id,
        city,
        title,
        price,
        lat: number("lat").or_else(|| number("latitude")),
        lng: number("lng")
            .or_else(|| number("longitude"))
            .or_else(|| number("lon")),
        rating: number("rating").unwrap_or(DEFAULT_RATING),
        category: text("category").unwrap_or_else(|| "any".to_string()),
        airline: text("airline").unwrap_or_else(|| "any".to_string()),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn normalizes_alternate_field_names() {
        let body = json!([
            {"bookingId": 77, "title": "Lisbon Old Town", "total": 249, "latitude": 38.72, "longitude": "-9.14"},
            {"id": "f-1", "city": "Kyoto", "kind": "flight", "price": "$319", "lat": 35.0, "lon": 135.77, "rating": 4.8}
        ]);

        let results = normalize_search_results(body, "stays");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "77");
        assert_eq!(results[0].city, "Lisbon Old Town");
        assert_eq!(results[0].kind, "stays");
        assert_eq!(results[0].price, "$249");
        assert_eq!(results[0].lat, Some(38.72));
        assert_eq!(results[0].lng, Some(-9.14));
        assert!((results[0].rating - 4.2).abs() < f64::EPSILON);

        assert_eq!(results[1].title, "flight in Kyoto");
        assert_eq!(results[1].lng, Some(135.77));
        assert_eq!(results[1].airline, "any");
    }

    #[test]
    fn missing_ids_fall_back_to_tab_initial() {
        let results = normalize_search_results(json!([{"city": "Pernem"}, {"city": "Kyoto"}]), "flights");
        assert_eq!(results[0].id, "F1");
        assert_eq!(results[1].id, "F2");
        assert_eq!(results[0].price, "$0");
        assert_eq!(results[0].title, "Pernem");
    }

    #[test]
    fn non_array_bodies_yield_nothing() {
        assert!(normalize_search_results(json!({"error": "nope"}), "flights").is_empty());
        assert!(normalize_search_results(Value::Null, "flights").is_empty());
    }

    #[test]
    fn search_result_converts_to_deal_candidate() {
        let results = normalize_search_results(json!([{"id": 3, "city": "Kyoto", "price": "$319"}]), "flights");
        let candidate = results[0].to_candidate();
        assert_eq!(candidate.id.as_deref(), Some("3"));
        assert_eq!(candidate.kind, Some(RecordKind::Deal));
        assert_eq!(candidate.display_label.as_deref(), Some("Kyoto"));
    }

    #[test]
    fn booking_request_flattens_details() {
        let record = Record::from_candidate(
            CandidateRecord::new().with_id("205").city("Santorini").price("$399"),
            "205".to_string(),
            None,
            chrono::Utc::now(),
        );
        let mut details = Map::new();
        details.insert("guests".to_string(), json!(2));

        let value = serde_json::to_value(BookingRequest::for_record(&record, details)).unwrap();
        assert_eq!(value["guests"], json!(2));
        assert_eq!(value["city"], json!("Santorini"));
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn client_rejects_relative_base_url() {
        assert!(matches!(
            TravelApiClient::new("localhost:8083", Duration::from_secs(1)),
            Err(ApiError::InvalidConfiguration(_))
        ));
    }
}
