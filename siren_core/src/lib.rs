//! # Siren core
//!
//! Domain types and the client/server state machines of the SIREN live alert pipeline:
//! the envelope codec, topology expansion, the cache merger, the ingestion coordinator,
//! the notification display scheduler and the active-state aggregator.
//!
//! Backends (queues, state stores, lookup services) are described by traits here and
//! implemented in `siren_mem`, `siren_pg`, `siren_relay` and `siren_client`.

#![deny(missing_docs)]

pub mod active_state;
pub mod alert;
pub mod cache;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod envelope;
pub mod lookup;
pub mod queue;
pub mod topology;

pub mod prelude {
    //! The prelude module for the `siren_core` crate.
    pub use super::active_state::{ActiveStateAggregator, AlertStateStore};
    pub use super::alert::{
        AlertDetail, AlertRecord, Area, EventCode, HistoryEntry, LifecycleState, PhenomenonState,
    };
    pub use super::cache::{AlertCaches, CacheMerger, MergeSummary};
    pub use super::color::{DEFAULT_COLOR, color_for};
    pub use super::config::{BATCH_MAX, BATCH_WAIT, CoordinatorConfig, DWELL, DisplayConfig};
    pub use super::coordinator::{
        CoordinatorHandle, CoordinatorSnapshot, CoordinatorState, IngestionCoordinator,
    };
    pub use super::display::{
        DisplayHandle, DisplayQueueEntry, DisplayScheduler, ShownNotification,
    };
    pub use super::envelope::{Action, CodecError, PushEnvelope};
    pub use super::lookup::AlertLookup;
    pub use super::queue::{Delivery, QueueConsumer};
    pub use super::topology::{Feature, FeatureProperties, Geometry, Position, Topology};
}
