//! The "currently active" read path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alert::{AlertDetail, AlertRecord, LifecycleState, PhenomenonState};

/// Storage of phenomenon states and detail versions.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// The error returned by the store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every phenomenon in `state`, joined with the detail its `most_recent_detail_ref`
    /// points to. Phenomena whose detail is missing are left out.
    async fn join_latest(&self, state: LifecycleState) -> Result<Vec<AlertRecord>, Self::Error>;

    /// Joined records for the given phenomenon identifiers, regardless of state. Unknown
    /// identifiers are omitted.
    async fn records_by_ids(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error>;

    /// Stores a detail version, replacing one with the same identifier.
    async fn record_detail(&self, detail: AlertDetail) -> Result<(), Self::Error>;

    /// Inserts or replaces a phenomenon state.
    async fn upsert_phenomenon(&self, state: PhenomenonState) -> Result<(), Self::Error>;
}

/// Derives the set of alerts active at a point in time.
///
/// This joins every active phenomenon with its detail on each call and filters by
/// expiry afterwards.
// TODO: maintain the active set from state-change events instead of joining per query.
#[derive(Debug, Clone)]
pub struct ActiveStateAggregator<S> {
    store: S,
}

impl<S: AlertStateStore> ActiveStateAggregator<S> {
    /// Creates an aggregator over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Alerts flagged active whose detail expires strictly after `now`.
    pub async fn active_at(&self, now: DateTime<Utc>) -> Result<Vec<AlertRecord>, S::Error> {
        let joined = self.store.join_latest(LifecycleState::Active).await?;
        let total = joined.len();
        let active: Vec<AlertRecord> = joined
            .into_iter()
            .filter(|record| record.is_active_at(now))
            .collect();
        log::debug!(
            "{} of {} active-flagged alerts unexpired at {}",
            active.len(),
            total,
            now
        );
        Ok(active)
    }

    /// Alerts active right now.
    pub async fn active(&self) -> Result<Vec<AlertRecord>, S::Error> {
        self.active_at(Utc::now()).await
    }
}
