use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use siren_core::prelude::*;
use siren_mem::InMemoryStateStore;
use tower::ServiceExt;

fn record(identifier: &str, expires_in: Duration, state: LifecycleState) -> AlertRecord {
    let now = Utc::now();
    let mut record = AlertRecord::from_parts(
        PhenomenonState {
            identifier: identifier.into(),
            state,
            most_recent_detail_ref: format!("urn:cap:{identifier}"),
            history: vec![],
            areas: vec!["KSZ001".into()],
        },
        AlertDetail {
            identifier: format!("urn:cap:{identifier}"),
            event: "Flood Warning".into(),
            event_code: EventCode {
                same: "FLW".into(),
                nws: "FLW".into(),
            },
            sent: now,
            effective: now,
            expires: now + expires_in,
            ..Default::default()
        },
    );
    record.lifecycle_state = state;
    record
}

async fn seeded_store() -> InMemoryStateStore {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("A1", Duration::hours(1), LifecycleState::Active))
        .await;
    store
        .insert_record(record("A2", Duration::minutes(-5), LifecycleState::Active))
        .await;
    store
        .insert_record(record("A3", Duration::hours(1), LifecycleState::Inactive))
        .await;
    store
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// GET /
// ============================================================================

#[tokio::test]
async fn root_identifies_the_service() {
    let response = siren_api::router(InMemoryStateStore::new())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"SIREN API");
}

// ============================================================================
// GET /active
// ============================================================================

#[tokio::test]
async fn active_returns_unexpired_active_alerts() {
    let response = siren_api::router(seeded_store().await)
        .oneshot(Request::get("/active").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records: Vec<AlertRecord> = body_json(response).await;
    let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["A1"]);
    assert_eq!(records[0].nws_code(), "FLW");
}

#[tokio::test]
async fn active_is_empty_for_an_empty_store() {
    let response = siren_api::router(InMemoryStateStore::new())
        .oneshot(Request::get("/active").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let records: Vec<AlertRecord> = body_json(response).await;
    assert!(records.is_empty());
}

// ============================================================================
// POST /alerts
// ============================================================================

#[tokio::test]
async fn alerts_resolves_requested_identifiers_in_order() {
    let request = Request::post("/alerts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"["A3","MISSING","A1"]"#))
        .unwrap();
    let response = siren_api::router(seeded_store().await)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records: Vec<AlertRecord> = body_json(response).await;
    let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["A3", "A1"]);
    assert_eq!(records[0].lifecycle_state, LifecycleState::Inactive);
}

#[tokio::test]
async fn alerts_rejects_a_malformed_body() {
    let request = Request::post("/alerts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"ids": 3}"#))
        .unwrap();
    let response = siren_api::router(InMemoryStateStore::new())
        .oneshot(request)
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
