//! Runs the client pipeline against in-process backends: envelopes published on an
//! in-memory queue are decoded and handed to the ingestion coordinator and the display
//! scheduler, and the lookup service answers from an in-memory state store.
//!
//! `RUST_LOG=debug cargo run -p siren --features in-memory --example in-memory-pipeline`

use std::time::Duration;

use chrono::Utc;
use log::info;
use siren::prelude::*;

fn record(identifier: &str, event: &str, code: &str, polygon: Option<Geometry>) -> AlertRecord {
    let now = Utc::now();
    AlertRecord::from_parts(
        PhenomenonState {
            identifier: identifier.into(),
            state: LifecycleState::Active,
            most_recent_detail_ref: format!("urn:cap:{identifier}"),
            history: vec![],
            areas: vec!["KSZ024".into()],
        },
        AlertDetail {
            identifier: format!("urn:cap:{identifier}"),
            sender: "w-nws.webmaster@noaa.gov".into(),
            sender_name: "NWS Topeka KS".into(),
            event: event.into(),
            event_code: EventCode {
                same: code.into(),
                nws: code.into(),
            },
            sent: now,
            effective: now,
            expires: now + chrono::Duration::hours(1),
            area: Area {
                description: "Shawnee".into(),
                polygon,
                ugc: vec!["KSZ024".into()],
            },
            ..Default::default()
        },
    )
}

fn announce(record: &AlertRecord, action: Action) -> PushEnvelope {
    PushEnvelope {
        identifier: record.identifier.clone(),
        action,
        event: record.detail.event.clone(),
        event_code: record.nws_code().to_string(),
        sender: record.detail.sender_name.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let store = InMemoryStateStore::new();
    let lookup = InMemoryAlertLookup::new(store.clone());
    let tornado = record(
        "TOR-1",
        "Tornado Warning",
        "TOW",
        Some(Geometry::Polygon {
            coordinates: vec![vec![
                [-95.8, 39.0],
                [-95.6, 39.0],
                [-95.6, 39.1],
                [-95.8, 39.0],
            ]],
        }),
    );
    let winter = record("WSW-1", "Winter Storm Warning", "WSW", None);
    lookup
        .set_zone_geometry(
            "WSW-1",
            Geometry::Polygon {
                coordinates: vec![vec![
                    [-96.0, 38.8],
                    [-95.5, 38.8],
                    [-95.5, 39.2],
                    [-96.0, 38.8],
                ]],
            },
        )
        .await;
    store.insert_record(tornado.clone()).await;

    let coordinator = IngestionCoordinator::new(lookup, CacheMerger::new(), Default::default());
    let seeded = coordinator.seed().await?;
    info!("Seeded {} alerts", seeded.alerts);
    let coordinator = coordinator.spawn();
    let display = DisplayScheduler::new(DisplayConfig {
        dwell: Duration::from_secs(2),
    })
    .spawn();

    let queue = InMemoryQueue::new();
    let mut consumer = queue.consumer();
    let (coordinator_tx, display_tx) = (coordinator.sender(), display.sender());
    let pump = tokio::spawn(async move {
        while let Ok(Some(delivery)) = consumer.recv().await {
            match PushEnvelope::decode(&delivery.payload) {
                Ok(envelope) => {
                    let _ = coordinator_tx.send(envelope.clone());
                    let _ = display_tx.send(envelope);
                }
                Err(e) => log::warn!("Skipping payload: {}", e),
            }
            let _ = consumer.ack(delivery.tag).await;
        }
    });

    store.insert_record(winter.clone()).await;
    queue.publish(announce(&tornado, Action::Update).encode()?).await?;
    queue.publish(announce(&winter, Action::New).encode()?).await?;

    let mut notifications = display.notifications();
    for _ in 0..2 {
        notifications.changed().await?;
        if let Some(shown) = notifications.borrow_and_update().clone() {
            info!(
                "Showing {} ({:?})",
                shown.entry.envelope.event, shown.entry.envelope.action
            );
        }
    }

    let caches = coordinator.caches();
    for feature in caches.features().await {
        info!(
            "{}: {} {}",
            feature.properties.id,
            feature.properties.name.unwrap_or_default(),
            feature.properties.color
        );
    }

    queue.close().await;
    pump.await?;
    coordinator.shutdown().await;
    display.shutdown().await;
    Ok(())
}
