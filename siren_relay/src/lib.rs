//! # Siren relay
//!
//! Fans queued ingestion messages out to every connected live subscriber.
//!
//! The relay reads the durable `push` queue through a
//! [`QueueConsumer`](siren_core::queue::QueueConsumer), republishes each payload unmodified
//! to the [`Broadcaster`], then acknowledges it. Subscribers connect over a websocket at
//! `/live` and only see messages published after they connected.

#![deny(missing_docs)]

mod amqp;
mod broadcaster;
mod relay;
mod server;

pub use amqp::{AmqpQueue, AmqpQueueError};
pub use broadcaster::{Broadcaster, DEFAULT_SUBSCRIBER_BUFFER};
pub use relay::{RelayError, run_relay};
pub use server::{Health, router};
