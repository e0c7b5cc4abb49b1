use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use siren_core::prelude::*;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Whether the live channel is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Receiving from the relay.
    Connected,
    /// Not connected; a reconnect is pending.
    Disconnected,
}

/// Configuration of a [`LiveFeed`].
#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    /// Websocket URL of the relay, e.g. `ws://relay:8080/live`.
    pub url: String,
    /// Delay before the first reconnect attempt.
    pub initial_reconnect_delay: Duration,
    /// Upper bound of the doubling reconnect delay.
    pub max_reconnect_delay: Duration,
}

impl LiveFeedConfig {
    /// Default backoff (1s doubling up to 60s) against `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// A websocket subscription to the relay.
///
/// Decoded envelopes are forwarded, in arrival order, to every sink. Payloads that fail to
/// decode are logged and skipped. The feed reconnects by itself; messages relayed while it
/// was disconnected are not replayed.
pub struct LiveFeed {
    status: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// Starts the feed task.
    pub fn spawn(config: LiveFeedConfig, sinks: Vec<mpsc::UnboundedSender<PushEnvelope>>) -> Self {
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);
        let task = tokio::spawn(run(config, sinks, status_tx));
        Self {
            status,
            task: Some(task),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver notified on status changes.
    pub fn statuses(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Closes the feed.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    config: LiveFeedConfig,
    sinks: Vec<mpsc::UnboundedSender<PushEnvelope>>,
    status: watch::Sender<ConnectionStatus>,
) {
    let mut reconnect_delay = config.initial_reconnect_delay;

    loop {
        info!("Connecting to live channel {}", config.url);
        let mut socket = match connect_async(config.url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                error!("Failed to connect to live channel: {}", e);
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
                continue;
            }
        };
        info!("Live channel connected");
        reconnect_delay = config.initial_reconnect_delay;
        status.send_replace(ConnectionStatus::Connected);

        while let Some(message) = socket.next().await {
            let payload = match message {
                Ok(Message::Binary(payload)) => payload,
                Ok(Message::Close(_)) => break,
                Ok(other) => {
                    debug!("Ignoring non-binary live message ({} bytes)", other.len());
                    continue;
                }
                Err(e) => {
                    warn!("Live channel error: {}", e);
                    break;
                }
            };
            match PushEnvelope::decode(&payload) {
                Ok(envelope) => {
                    for sink in &sinks {
                        let _ = sink.send(envelope.clone());
                    }
                }
                Err(e) => error!("Discarding undecodable live message: {}", e),
            }
        }

        status.send_replace(ConnectionStatus::Disconnected);
        warn!(
            "Live channel disconnected, reconnecting in {:?}",
            reconnect_delay
        );
        sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
    }
}
