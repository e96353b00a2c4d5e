//! End-to-end checks against a local HTTP server standing in for the travel backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wayfare_core::api::{BookingRequest, SubscriptionRequest, TravelApiClient};
use wayfare_core::mirror::HttpMirror;
use wayfare_core::storage::MemoryBackend;
use wayfare_core::{collections, CandidateRecord, RecordStore};

type Received = Arc<Mutex<Vec<Value>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn accept_saved(State(received): State<Received>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    received.lock().unwrap().push(body);
    (
        StatusCode::CREATED,
        Json(json!({"id": 501, "saved_at": "2025-03-01T10:00:00Z"})),
    )
}

async fn reject_saved() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database offline")
}

fn local_store() -> RecordStore {
    RecordStore::builder(Arc::new(MemoryBackend::new()))
        .default_owner(Some("1".to_string()))
        .build()
}

#[tokio::test(flavor = "multi_thread")]
async fn saved_record_is_reconciled_with_server_fields() {
    let received: Received = Arc::default();
    let base = serve(
        Router::new()
            .route("/api/saved", post(accept_saved))
            .with_state(Arc::clone(&received)),
    )
    .await;

    let store = local_store();
    store
        .attach_mirror(HttpMirror::new(&base, Duration::from_secs(5)).unwrap(), Duration::from_secs(5))
        .unwrap();

    let record = store.save(
        collections::SAVED_ITEMS,
        CandidateRecord::new().city("Lisbon").price("$249").image("lisbon.png"),
    );
    assert!(record.server_fields.is_none());
    store.flush_mirror().await;

    let bodies = received.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![json!({
            "city": "Lisbon",
            "img": "lisbon.png",
            "kind": "deal",
            "price": "$249",
            "title": "Lisbon",
            "userId": "1"
        })]
    );

    let reconciled = store.get(collections::SAVED_ITEMS, &record.id).unwrap();
    assert_eq!(reconciled.id, record.id);
    assert_eq!(reconciled.server_id().as_deref(), Some("501"));
    assert_eq!(reconciled.display_label, "Lisbon");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_keeps_local_copy() {
    let base = serve(Router::new().route("/api/saved", post(reject_saved))).await;
    let store = local_store();
    store
        .attach_mirror(HttpMirror::new(&base, Duration::from_secs(5)).unwrap(), Duration::from_secs(5))
        .unwrap();

    let record = store.save(collections::SAVED_ITEMS, CandidateRecord::new().city("Santorini"));
    store.flush_mirror().await;

    let listed = store.list(collections::SAVED_ITEMS);
    assert_eq!(listed, vec![record]);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_keeps_local_copy() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = local_store();
    store
        .attach_mirror(HttpMirror::new(&base, Duration::from_secs(2)).unwrap(), Duration::from_secs(2))
        .unwrap();

    let record = store.save(collections::SAVED_ITEMS, CandidateRecord::new().city("Kyoto"));
    assert_eq!(store.list(collections::SAVED_ITEMS).len(), 1);
    store.flush_mirror().await;

    let listed = store.list(collections::SAVED_ITEMS);
    assert_eq!(listed, vec![record]);
}

#[derive(serde::Deserialize)]
struct SearchParams {
    from: String,
    tab: String,
}

async fn search(headers: HeaderMap, Query(params): Query<SearchParams>) -> Json<Value> {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer token-123");
    Json(json!([
        {"bookingId": 9, "title": format!("{} to Lisbon", params.from), "total": 249, "latitude": 38.72, "longitude": -9.14},
        {"city": "Kyoto", "kind": params.tab, "price": "$319", "rating": if authorized { 5.0 } else { 1.0 }}
    ]))
}

#[tokio::test(flavor = "multi_thread")]
async fn search_normalizes_backend_results() {
    let base = serve(Router::new().route("/api/search", get(search))).await;
    let client = TravelApiClient::new(&base, Duration::from_secs(5))
        .unwrap()
        .with_auth_token(Some("token-123".to_string()));

    let results = client.search("New York", "flights").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "9");
    assert_eq!(results[0].city, "New York to Lisbon");
    assert_eq!(results[0].price, "$249");
    assert_eq!(results[0].lng, Some(-9.14));
    assert_eq!(results[1].id, "F2");
    assert_eq!(results[1].title, "flights in Kyoto");
    assert!((results[1].rating - 5.0).abs() < f64::EPSILON);
}

#[tokio::test(flavor = "multi_thread")]
async fn search_surfaces_server_errors() {
    let base = serve(Router::new().route("/api/search", get(reject_saved))).await;
    let client = TravelApiClient::new(&base, Duration::from_secs(5)).unwrap();

    let error = client.search("Lisbon", "stays").await.unwrap_err();
    assert!(error.to_string().contains("500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn bookings_and_subscriptions_degrade_to_none() {
    let received: Received = Arc::default();
    let base = serve(
        Router::new()
            .route("/api/bookings", post(accept_saved))
            .route("/api/subscribe", post(reject_saved))
            .with_state(Arc::clone(&received)),
    )
    .await;
    let client = TravelApiClient::new(&base, Duration::from_secs(5)).unwrap();

    let store = local_store();
    let record = store.upsert(
        collections::BOOKINGS,
        CandidateRecord::new().with_id("205").city("Santorini").price("$399"),
    );
    let created = client
        .create_booking(&BookingRequest::for_record(&record, serde_json::Map::new()))
        .await;
    assert_eq!(created.unwrap()["id"], json!(501));
    assert_eq!(received.lock().unwrap()[0]["city"], json!("Santorini"));

    let subscribed = client
        .subscribe(&SubscriptionRequest {
            email: "traveler@example.com".to_string(),
            plan: "pro".to_string(),
            method: "card".to_string(),
        })
        .await;
    assert!(subscribed.is_none());
}
