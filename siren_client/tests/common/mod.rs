#![allow(dead_code)]

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use siren_core::prelude::*;
use siren_mem::InMemoryStateStore;
use tokio::net::TcpListener;

pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router).into_future());
    addr
}

pub fn square(offset: f64) -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            [offset, 0.0],
            [offset + 1.0, 0.0],
            [offset + 1.0, 1.0],
            [offset, 1.0],
            [offset, 0.0],
        ]],
    }
}

/// Stand-in for the geometry service: a square per requested identifier.
async fn polygons(Json(identifiers): Json<Vec<String>>) -> Vec<u8> {
    let features: Vec<Feature> = identifiers
        .iter()
        .enumerate()
        .map(|(i, id)| Feature {
            geometry: square(i as f64),
            properties: FeatureProperties {
                id: id.clone(),
                name: None,
                color: DEFAULT_COLOR.to_string(),
            },
        })
        .collect();
    Topology::from_features(&features).encode().unwrap()
}

/// The API router over `store` with the geometry route mounted beside it.
pub fn api_with_geometry(store: InMemoryStateStore) -> Router {
    siren_api::router(store).route("/polygon", post(polygons))
}

pub fn record(identifier: &str, code: &str, polygon: Option<Geometry>) -> AlertRecord {
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
            expires: now + ChronoDuration::hours(1),
            area: Area {
                polygon,
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

pub fn envelope(identifier: &str, action: Action) -> PushEnvelope {
    PushEnvelope {
        identifier: identifier.into(),
        action,
        event: "Tornado Warning".into(),
        event_code: "TOW".into(),
        sender: "NWS Topeka KS".into(),
    }
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}
