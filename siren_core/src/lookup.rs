//! The authoritative query service, as seen from a client.

use async_trait::async_trait;

use crate::alert::AlertRecord;
use crate::topology::Topology;

/// Request/response access to the alert-detail and geometry services.
#[async_trait]
pub trait AlertLookup: Send + Sync {
    /// The error returned by every call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Full records for the given identifiers. Unknown identifiers are omitted.
    async fn fetch_alerts(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Self::Error>;

    /// Boundary topology for alerts that carry no polygon of their own.
    async fn fetch_geometry(&self, identifiers: &[String]) -> Result<Topology, Self::Error>;

    /// The currently active alerts, used to seed the caches.
    async fn fetch_active(&self) -> Result<Vec<AlertRecord>, Self::Error>;
}
