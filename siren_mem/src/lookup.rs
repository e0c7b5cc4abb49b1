use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use siren_core::color::DEFAULT_COLOR;
use siren_core::prelude::*;

use crate::state_store::{InMemoryStateStore, InMemoryStateStoreError};

/// A request received by [`InMemoryAlertLookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    /// `fetch_alerts` with the requested identifiers.
    Alerts(Vec<String>),
    /// `fetch_geometry` with the requested identifiers.
    Geometry(Vec<String>),
    /// `fetch_active`.
    Active,
}

/// Errors returned by [`InMemoryAlertLookup`].
#[derive(Debug, thiserror::Error)]
pub enum InMemoryLookupError {
    /// The service was switched off with [`InMemoryAlertLookup::set_available`].
    #[error("Lookup service unavailable")]
    Unavailable,
    /// The backing store failed.
    #[error("State store error: {0}")]
    Store(#[from] InMemoryStateStoreError),
}

/// An authoritative lookup service answering from an [`InMemoryStateStore`].
///
/// Zone geometry for alerts without a native polygon is registered with
/// [`set_zone_geometry`](Self::set_zone_geometry). Every request is logged so tests can
/// assert on batching.
#[derive(Clone, Debug)]
pub struct InMemoryAlertLookup {
    store: InMemoryStateStore,
    aggregator: ActiveStateAggregator<InMemoryStateStore>,
    zones: Arc<Mutex<HashMap<String, Geometry>>>,
    requests: Arc<Mutex<Vec<LookupRequest>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryAlertLookup {
    /// Creates a lookup service over `store`.
    pub fn new(store: InMemoryStateStore) -> Self {
        Self {
            aggregator: ActiveStateAggregator::new(store.clone()),
            store,
            zones: Arc::default(),
            requests: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &InMemoryStateStore {
        &self.store
    }

    /// Registers the boundary served by `fetch_geometry` for an alert.
    pub async fn set_zone_geometry(&self, identifier: impl Into<String>, geometry: Geometry) {
        self.zones.lock().await.insert(identifier.into(), geometry);
    }

    /// Makes every subsequent call fail (`false`) or succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Requests received so far, in order.
    pub async fn requests(&self) -> Vec<LookupRequest> {
        self.requests.lock().await.clone()
    }

    async fn log_request(&self, request: LookupRequest) -> Result<(), InMemoryLookupError> {
        self.requests.lock().await.push(request);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(InMemoryLookupError::Unavailable)
        }
    }
}

#[async_trait]
impl AlertLookup for InMemoryAlertLookup {
    type Error = InMemoryLookupError;

    async fn fetch_alerts(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error> {
        self.log_request(LookupRequest::Alerts(identifiers.to_vec()))
            .await?;
        Ok(self.store.records_by_ids(identifiers).await?)
    }

    async fn fetch_geometry(&self, identifiers: &[String]) -> Result<Topology, Self::Error> {
        self.log_request(LookupRequest::Geometry(identifiers.to_vec()))
            .await?;
        let zones = self.zones.lock().await;
        let features: Vec<Feature> = identifiers
            .iter()
            .filter_map(|identifier| {
                zones.get(identifier).map(|geometry| Feature {
                    geometry: geometry.clone(),
                    properties: FeatureProperties {
                        id: identifier.clone(),
                        name: None,
                        color: DEFAULT_COLOR.to_string(),
                    },
                })
            })
            .collect();
        Ok(Topology::from_features(&features))
    }

    async fn fetch_active(&self) -> Result<Vec<AlertRecord>, Self::Error> {
        self.log_request(LookupRequest::Active).await?;
        Ok(self.aggregator.active().await?)
    }
}
