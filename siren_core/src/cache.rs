//! Client-side alert and geometry caches.
//!
//! [`CacheMerger`] is the only writer. Everything else (presentation, the coordinator's
//! freshness check) reads through cloned [`AlertCaches`] handles.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::alert::AlertRecord;
use crate::color::{DEFAULT_COLOR, color_for};
use crate::topology::{Feature, FeatureProperties};

#[derive(Debug, Default)]
struct CacheState {
    alerts: HashMap<String, AlertRecord>,
    features: HashMap<String, Feature>,
}

/// Read handle over the alert cache and the geometry cache.
#[derive(Clone, Debug)]
pub struct AlertCaches {
    state: Arc<RwLock<CacheState>>,
    revision: watch::Receiver<u64>,
}

impl AlertCaches {
    /// Whether an alert is cached under `identifier`.
    pub async fn contains_alert(&self, identifier: &str) -> bool {
        self.state.read().await.alerts.contains_key(identifier)
    }

    /// The cached alert, if any.
    pub async fn alert(&self, identifier: &str) -> Option<AlertRecord> {
        self.state.read().await.alerts.get(identifier).cloned()
    }

    /// All cached alerts, in no particular order.
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.state.read().await.alerts.values().cloned().collect()
    }

    /// The cached feature, if any.
    pub async fn feature(&self, identifier: &str) -> Option<Feature> {
        self.state.read().await.features.get(identifier).cloned()
    }

    /// All cached features, in no particular order.
    pub async fn features(&self) -> Vec<Feature> {
        self.state.read().await.features.values().cloned().collect()
    }

    /// Number of cached alerts.
    pub async fn alert_count(&self) -> usize {
        self.state.read().await.alerts.len()
    }

    /// Number of cached features.
    pub async fn feature_count(&self) -> usize {
        self.state.read().await.features.len()
    }

    /// Current revision. Bumped by every merge that touched the caches.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified on every revision bump.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }
}

/// What a merge wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Alerts inserted or overwritten.
    pub alerts: usize,
    /// Features inserted or overwritten.
    pub features: usize,
}

/// Owner of the caches. Folds lookup results in by key, never replacing a cache wholesale.
#[derive(Debug)]
pub struct CacheMerger {
    state: Arc<RwLock<CacheState>>,
    revision: watch::Sender<u64>,
    caches: AlertCaches,
}

impl Default for CacheMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMerger {
    /// Creates a merger over empty caches.
    pub fn new() -> Self {
        let state = Arc::new(RwLock::new(CacheState::default()));
        let (revision, receiver) = watch::channel(0);
        Self {
            caches: AlertCaches {
                state: state.clone(),
                revision: receiver,
            },
            state,
            revision,
        }
    }

    /// A read handle over the caches.
    pub fn caches(&self) -> AlertCaches {
        self.caches.clone()
    }

    /// Merges fetched records and the features expanded from a geometry response.
    ///
    /// Records are merged first. A record with a native polygon yields its own feature;
    /// the provided features are named and colored from the alert cache as it stands after
    /// the records were merged, falling back to [`DEFAULT_COLOR`] for unknown alerts.
    pub async fn merge(&self, records: Vec<AlertRecord>, features: Vec<Feature>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        {
            let mut state = self.state.write().await;

            for record in records {
                if let Some(geometry) = record.native_polygon() {
                    let feature = Feature {
                        geometry: geometry.clone(),
                        properties: FeatureProperties {
                            id: record.identifier.clone(),
                            name: Some(record.detail.event.clone()),
                            color: color_for(record.nws_code()).to_string(),
                        },
                    };
                    state.features.insert(record.identifier.clone(), feature);
                    summary.features += 1;
                }
                state.alerts.insert(record.identifier.clone(), record);
                summary.alerts += 1;
            }

            for mut feature in features {
                let (name, color) = match state.alerts.get(&feature.properties.id) {
                    Some(alert) => (
                        Some(alert.detail.event.clone()),
                        color_for(alert.nws_code()).to_string(),
                    ),
                    None => (None, DEFAULT_COLOR.to_string()),
                };
                feature.properties.name = name;
                feature.properties.color = color;
                state
                    .features
                    .insert(feature.properties.id.clone(), feature);
                summary.features += 1;
            }
        }

        if summary != MergeSummary::default() {
            self.revision.send_modify(|revision| *revision += 1);
        }
        log::debug!(
            "Merged {} alerts and {} features",
            summary.alerts,
            summary.features
        );
        summary
    }
}
