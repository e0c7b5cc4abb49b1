//! # Siren
//!
//! Live distribution of weather alerts. `siren_core` is always available; the backends
//! are enabled by feature:
//!
//! - `in-memory`: queue, state store and lookup service kept in process.
//! - `postgres`: the postgres state store and its migrations.
//! - `relay`: the queue-to-websocket relay.
//! - `client`: the HTTP lookup, live feed and client session.
//! - `api`: the HTTP read path over a state store.

#![deny(missing_docs)]

/// Domain types, codecs and the client state machines.
pub mod domain {
    //! Re-exports `siren_core`.
    pub use siren_core::*;
}

#[cfg(feature = "in-memory")]
/// In-process backends.
pub mod mem {
    //! Re-exports `siren_mem`.
    pub use siren_mem::*;
}

#[cfg(feature = "postgres")]
/// The postgres state store.
pub mod pg {
    //! Re-exports `siren_pg`.
    pub use siren_pg::*;
}

#[cfg(feature = "relay")]
/// The queue relay.
pub mod relay {
    //! Re-exports `siren_relay`.
    pub use siren_relay::*;
}

#[cfg(feature = "client")]
/// The client pipeline.
pub mod client {
    //! Re-exports `siren_client`.
    pub use siren_client::*;
}

#[cfg(feature = "api")]
/// The HTTP read path.
pub mod api {
    //! Re-exports `siren_api`.
    pub use siren_api::*;
}

pub mod prelude {
    //! The prelude module for the `siren` crate.
    pub use siren_core::prelude::*;

    #[cfg(feature = "in-memory")]
    pub use super::mem::{
        InMemoryAlertLookup, InMemoryQueue, InMemoryQueueConsumer, InMemoryStateStore,
    };
    #[cfg(feature = "postgres")]
    pub use super::pg::{Migrator, PgAlertStateStore};
    #[cfg(feature = "relay")]
    pub use super::relay::{Broadcaster, run_relay};
    #[cfg(feature = "client")]
    pub use super::client::{ClientSession, ConnectionStatus, HttpAlertLookup, SessionConfig};
}
