use chrono::{Duration as ChronoDuration, Utc};
use siren_core::prelude::*;
use siren_mem::{InMemoryAlertLookup, InMemoryStateStore, LookupRequest};
use std::time::Duration;

fn polygon() -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            [-95.0, 38.0],
            [-94.0, 38.0],
            [-94.0, 39.0],
            [-95.0, 38.0],
        ]],
    }
}

fn record(
    identifier: &str,
    code: &str,
    expires_in: ChronoDuration,
    polygon: Option<Geometry>,
) -> AlertRecord {
    let now = Utc::now();
    AlertRecord::from_parts(
        PhenomenonState {
            identifier: identifier.into(),
            state: LifecycleState::Active,
            most_recent_detail_ref: format!("urn:cap:{identifier}"),
            history: vec![],
            areas: vec![],
        },
        AlertDetail {
            identifier: format!("urn:cap:{identifier}"),
            event: format!("{code} event"),
            event_code: EventCode {
                same: String::new(),
                nws: code.into(),
            },
            sent: now,
            effective: now,
            expires: now + expires_in,
            area: Area {
                polygon,
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

fn envelope(identifier: &str, action: Action) -> PushEnvelope {
    PushEnvelope {
        identifier: identifier.into(),
        action,
        event: "Tornado Warning".into(),
        event_code: "TOW".into(),
        sender: "NWS Topeka KS".into(),
    }
}

// ============================================================================
// Active-state aggregation
// ============================================================================

#[tokio::test]
async fn aggregator_filters_on_strict_expiry() {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("EXPIRED", "TOW", ChronoDuration::seconds(-1), None))
        .await;
    store
        .insert_record(record("LIVE", "TOW", ChronoDuration::seconds(1), None))
        .await;
    let mut cancelled = record("CANCELLED", "TOW", ChronoDuration::hours(1), None);
    cancelled.lifecycle_state = LifecycleState::Inactive;
    store.insert_record(cancelled).await;

    let aggregator = ActiveStateAggregator::new(store);
    let active = aggregator.active_at(Utc::now()).await.unwrap();
    let ids: Vec<&str> = active.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["LIVE"]);
}

#[tokio::test]
async fn aggregator_is_a_point_in_time_snapshot() {
    let store = InMemoryStateStore::new();
    let live = record("LIVE", "TOW", ChronoDuration::minutes(10), None);
    let expires = live.detail.expires;
    store.insert_record(live).await;

    let aggregator = ActiveStateAggregator::new(store);
    assert_eq!(
        aggregator
            .active_at(expires - ChronoDuration::seconds(1))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(aggregator.active_at(expires).await.unwrap().is_empty());
}

// ============================================================================
// Ingestion against the in-memory lookup service
// ============================================================================

#[tokio::test(start_paused = true)]
async fn new_envelope_populates_alert_cache_after_one_batch() {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("X1", "TOW", ChronoDuration::hours(1), Some(polygon())))
        .await;
    let lookup = InMemoryAlertLookup::new(store);
    let handle =
        IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), CoordinatorConfig::default())
            .spawn();

    handle.submit(envelope("X1", Action::New));
    tokio::time::sleep(BATCH_WAIT + Duration::from_millis(1)).await;
    handle.snapshot().await.unwrap();

    assert_eq!(
        lookup.requests().await,
        vec![LookupRequest::Alerts(vec!["X1".to_string()])]
    );
    let caches = handle.caches();
    assert_eq!(caches.alert("X1").await.unwrap().detail.event, "TOW event");
    assert_eq!(caches.feature("X1").await.unwrap().properties.color, "#FF0000");
}

#[tokio::test(start_paused = true)]
async fn alerts_without_polygon_get_zone_geometry() {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("NATIVE", "SVW", ChronoDuration::hours(1), Some(polygon())))
        .await;
    store
        .insert_record(record("ZONED", "WSW", ChronoDuration::hours(1), None))
        .await;
    let lookup = InMemoryAlertLookup::new(store);
    lookup.set_zone_geometry("ZONED", polygon()).await;
    let handle =
        IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), CoordinatorConfig::default())
            .spawn();

    handle.submit(envelope("NATIVE", Action::New));
    handle.submit(envelope("ZONED", Action::New));
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.snapshot().await.unwrap();

    let requests = lookup.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], LookupRequest::Geometry(vec!["ZONED".to_string()]));

    let zoned = handle.caches().feature("ZONED").await.unwrap();
    assert_eq!(zoned.properties.color, "#FF69B4");
    assert_eq!(zoned.properties.name.as_deref(), Some("WSW event"));
    assert_eq!(zoned.geometry, polygon());
}

#[tokio::test(start_paused = true)]
async fn unavailable_service_drops_the_batch() {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("A", "TOW", ChronoDuration::hours(1), None))
        .await;
    let lookup = InMemoryAlertLookup::new(store);
    lookup.set_available(false);
    let handle =
        IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), CoordinatorConfig::default())
            .spawn();

    handle.submit(envelope("A", Action::New));
    handle.submit(envelope("B", Action::New));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.pending.is_empty());

    // Coming back doesn't resurrect the dropped identifiers.
    lookup.set_available(true);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(lookup.requests().await.len(), 1);
    assert_eq!(handle.caches().alert_count().await, 0);
}

#[tokio::test]
async fn seeding_loads_active_alerts_with_geometry() {
    let store = InMemoryStateStore::new();
    store
        .insert_record(record("ACTIVE", "FFW", ChronoDuration::hours(1), None))
        .await;
    store
        .insert_record(record("OLD", "FFW", ChronoDuration::hours(-1), None))
        .await;
    let lookup = InMemoryAlertLookup::new(store);
    lookup.set_zone_geometry("ACTIVE", polygon()).await;

    let coordinator =
        IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), CoordinatorConfig::default());
    let summary = coordinator.seed().await.unwrap();
    assert_eq!(summary, MergeSummary { alerts: 1, features: 1 });

    let caches = coordinator.caches();
    assert!(caches.contains_alert("ACTIVE").await);
    assert!(!caches.contains_alert("OLD").await);
    assert_eq!(caches.feature("ACTIVE").await.unwrap().properties.color, "#8B0000");
}
