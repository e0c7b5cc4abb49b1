//! # Siren client
//!
//! The client half of the live pipeline: an HTTP [`AlertLookup`](siren_core::lookup::AlertLookup)
//! against the query and geometry services, a websocket [`LiveFeed`] that survives relay
//! outages, and [`ClientSession`], which wires them to the ingestion coordinator and the
//! display scheduler.

#![deny(missing_docs)]

mod http;
mod live;
mod session;

pub use http::{HttpAlertLookup, LookupError};
pub use live::{ConnectionStatus, LiveFeed, LiveFeedConfig};
pub use session::{ClientSession, SessionConfig};
