mod common;

use common::{api_with_geometry, record, serve, square};
use siren_client::{HttpAlertLookup, LookupError};
use siren_core::prelude::*;
use siren_mem::InMemoryStateStore;

async fn lookup_over(store: InMemoryStateStore) -> HttpAlertLookup {
    let addr = serve(api_with_geometry(store)).await;
    let base = format!("http://{addr}/");
    HttpAlertLookup::new(base.clone(), base)
}

// ============================================================================
// Query service
// ============================================================================

#[tokio::test]
async fn fetch_alerts_returns_known_records() {
    let store = InMemoryStateStore::new();
    store.insert_record(record("X1", "TOW", None)).await;
    store.insert_record(record("X2", "SVW", Some(square(0.0)))).await;
    let lookup = lookup_over(store).await;

    let records = lookup
        .fetch_alerts(&["X2".to_string(), "NOPE".to_string(), "X1".to_string()])
        .await
        .unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["X2", "X1"]);
    assert_eq!(records[0].native_polygon(), Some(&square(0.0)));
}

#[tokio::test]
async fn fetch_active_returns_the_active_set() {
    let store = InMemoryStateStore::new();
    store.insert_record(record("LIVE", "TOW", None)).await;
    let mut cancelled = record("GONE", "TOW", None);
    cancelled.lifecycle_state = LifecycleState::Inactive;
    store.insert_record(cancelled).await;
    let lookup = lookup_over(store).await;

    let active = lookup.fetch_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].identifier, "LIVE");
}

// ============================================================================
// Geometry service
// ============================================================================

#[tokio::test]
async fn fetch_geometry_decodes_the_topology() {
    let lookup = lookup_over(InMemoryStateStore::new()).await;

    let topology = lookup
        .fetch_geometry(&["Z1".to_string(), "Z2".to_string()])
        .await
        .unwrap();
    let mut features = topology.features().unwrap();
    features.sort_by(|a, b| a.properties.id.cmp(&b.properties.id));

    assert_eq!(features.len(), 2);
    assert_eq!(features[0].properties.id, "Z1");
    assert_eq!(features[0].geometry, square(0.0));
    assert_eq!(features[1].geometry, square(1.0));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn error_status_is_reported() {
    let addr = serve(siren_api::router(InMemoryStateStore::new())).await;
    let base = format!("http://{addr}");
    let lookup = HttpAlertLookup::new(base.clone(), base);

    let err = lookup.fetch_geometry(&["Z1".to_string()]).await.unwrap_err();
    match err {
        LookupError::Http(e) => assert_eq!(e.status().map(|s| s.as_u16()), Some(404)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_an_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let lookup = HttpAlertLookup::new(format!("http://{addr}"), format!("http://{addr}"));

    let err = lookup.fetch_active().await.unwrap_err();
    assert!(matches!(err, LookupError::Http(_)));
}
