//! # Siren memory backends
//!
//! In-memory implementations of the siren backends, primarily for testing and demos:
//! an acknowledged FIFO queue, a phenomenon/detail state store and an authoritative
//! lookup service answering from that store.
//!
//! ```ignore
//! let store = InMemoryStateStore::new();
//! store.record_detail(detail).await?;
//! store.upsert_phenomenon(state).await?;
//!
//! let lookup = InMemoryAlertLookup::new(store.clone());
//! let coordinator = IngestionCoordinator::new(lookup, CacheMerger::new(), Default::default());
//! ```
//!
//! None of these persist anything.

#![deny(missing_docs)]

mod lookup;
mod queue;
mod state_store;

pub use lookup::*;
pub use queue::*;
pub use state_store::*;
