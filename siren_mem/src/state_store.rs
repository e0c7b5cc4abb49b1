use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use siren_core::prelude::*;

#[derive(Debug, Default)]
struct StoreData {
    details: HashMap<String, AlertDetail>,
    phenomena: HashMap<String, PhenomenonState>,
}

impl StoreData {
    fn join(&self, state: &PhenomenonState) -> Option<AlertRecord> {
        self.details
            .get(&state.most_recent_detail_ref)
            .map(|detail| AlertRecord::from_parts(state.clone(), detail.clone()))
    }
}

/// An in-memory [`AlertStateStore`]. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStateStore {
    data: Arc<RwLock<StoreData>>,
}

/// The error of the in-memory store. It is never returned.
#[derive(Debug, thiserror::Error)]
#[error("InMemoryStateStoreInfallibleError")]
pub struct InMemoryStateStoreError;

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for seeding: stores `detail` and points a phenomenon at it.
    pub async fn insert_record(&self, record: AlertRecord) {
        let mut data = self.data.write().await;
        let state = PhenomenonState {
            identifier: record.identifier,
            state: record.lifecycle_state,
            most_recent_detail_ref: record.detail.identifier.clone(),
            history: record.history,
            areas: record.detail.area.ugc.clone(),
        };
        data.details
            .insert(record.detail.identifier.clone(), record.detail);
        data.phenomena.insert(state.identifier.clone(), state);
    }
}

#[async_trait]
impl AlertStateStore for InMemoryStateStore {
    type Error = InMemoryStateStoreError;

    async fn join_latest(&self, state: LifecycleState) -> Result<Vec<AlertRecord>, Self::Error> {
        let data = self.data.read().await;
        let mut records: Vec<AlertRecord> = data
            .phenomena
            .values()
            .filter(|phenomenon| phenomenon.state == state)
            .filter_map(|phenomenon| data.join(phenomenon))
            .collect();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }

    async fn records_by_ids(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error> {
        let data = self.data.read().await;
        Ok(identifiers
            .iter()
            .filter_map(|identifier| data.phenomena.get(identifier))
            .filter_map(|phenomenon| data.join(phenomenon))
            .collect())
    }

    async fn record_detail(&self, detail: AlertDetail) -> Result<(), Self::Error> {
        log::debug!("Recording detail {}", detail.identifier);
        let mut data = self.data.write().await;
        data.details.insert(detail.identifier.clone(), detail);
        Ok(())
    }

    async fn upsert_phenomenon(&self, state: PhenomenonState) -> Result<(), Self::Error> {
        log::debug!(
            "Upserting phenomenon {} ({:?})",
            state.identifier,
            state.state
        );
        let mut data = self.data.write().await;
        data.phenomena.insert(state.identifier.clone(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn phenomenon(identifier: &str, detail_ref: &str, state: LifecycleState) -> PhenomenonState {
        PhenomenonState {
            identifier: identifier.into(),
            state,
            most_recent_detail_ref: detail_ref.into(),
            history: vec![],
            areas: vec![],
        }
    }

    fn detail(identifier: &str, event: &str) -> AlertDetail {
        AlertDetail {
            identifier: identifier.into(),
            event: event.into(),
            expires: Utc::now() + Duration::hours(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn join_follows_most_recent_detail_ref() {
        let store = InMemoryStateStore::new();
        store.record_detail(detail("cap-1", "Flood Watch")).await.unwrap();
        store.record_detail(detail("cap-2", "Flood Warning")).await.unwrap();
        store
            .upsert_phenomenon(phenomenon("P1", "cap-1", LifecycleState::Active))
            .await
            .unwrap();
        store
            .upsert_phenomenon(phenomenon("P1", "cap-2", LifecycleState::Active))
            .await
            .unwrap();

        let records = store.join_latest(LifecycleState::Active).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].detail.event, "Flood Warning");
        assert_eq!(records[0].most_recent_detail_ref, "cap-2");
    }

    #[tokio::test]
    async fn dangling_refs_and_other_states_are_left_out() {
        let store = InMemoryStateStore::new();
        store.record_detail(detail("cap-1", "Heat Advisory")).await.unwrap();
        store
            .upsert_phenomenon(phenomenon("P1", "cap-1", LifecycleState::Inactive))
            .await
            .unwrap();
        store
            .upsert_phenomenon(phenomenon("P2", "missing", LifecycleState::Active))
            .await
            .unwrap();

        assert!(store.join_latest(LifecycleState::Active).await.unwrap().is_empty());
        assert_eq!(
            store.join_latest(LifecycleState::Inactive).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn records_by_ids_ignores_unknown_and_keeps_request_order() {
        let store = InMemoryStateStore::new();
        for (id, cap) in [("A", "cap-a"), ("B", "cap-b")] {
            store.record_detail(detail(cap, "Wind Advisory")).await.unwrap();
            store
                .upsert_phenomenon(phenomenon(id, cap, LifecycleState::Inactive))
                .await
                .unwrap();
        }

        let ids = vec!["B".to_string(), "nope".to_string(), "A".to_string()];
        let records = store.records_by_ids(&ids).await.unwrap();
        let found: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(found, vec!["B", "A"]);
    }
}
