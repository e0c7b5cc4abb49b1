use log::{info, warn};
use siren_core::prelude::*;
use tokio::sync::watch;

use crate::live::{ConnectionStatus, LiveFeed, LiveFeedConfig};

/// Everything a [`ClientSession`] needs to start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Batching of detail lookups.
    pub coordinator: CoordinatorConfig,
    /// Notification dwell.
    pub display: DisplayConfig,
    /// Relay subscription.
    pub live: LiveFeedConfig,
}

impl SessionConfig {
    /// Default timings against the given relay URL.
    pub fn new(live_url: impl Into<String>) -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            display: DisplayConfig::default(),
            live: LiveFeedConfig::new(live_url),
        }
    }
}

/// A running client: the live feed fans every envelope out to the ingestion coordinator
/// and the display scheduler.
pub struct ClientSession {
    coordinator: CoordinatorHandle,
    display: DisplayHandle,
    live: LiveFeed,
}

impl ClientSession {
    /// Seeds the caches from the active set, then starts the pipeline.
    ///
    /// A failed seed is logged; the session still starts with empty caches.
    pub async fn start<L: AlertLookup + 'static>(lookup: L, config: SessionConfig) -> Self {
        let coordinator = IngestionCoordinator::new(lookup, CacheMerger::new(), config.coordinator);
        if let Err(e) = coordinator.seed().await {
            warn!("Failed to seed alert caches: {}", e);
        }
        let coordinator = coordinator.spawn();
        let display = DisplayScheduler::new(config.display).spawn();
        let live = LiveFeed::spawn(config.live, vec![coordinator.sender(), display.sender()]);
        info!("Client session started");
        Self {
            coordinator,
            display,
            live,
        }
    }

    /// Read handle over the alert and feature caches.
    pub fn caches(&self) -> AlertCaches {
        self.coordinator.caches()
    }

    /// The notification on screen, updated as the display advances.
    pub fn notifications(&self) -> watch::Receiver<Option<ShownNotification>> {
        self.display.notifications()
    }

    /// Current relay connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.live.status()
    }

    /// Receiver notified on relay connection changes.
    pub fn statuses(&self) -> watch::Receiver<ConnectionStatus> {
        self.live.statuses()
    }

    /// The ingestion coordinator, for state inspection.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Stops the live feed first, then the coordinator and the display.
    pub async fn shutdown(self) {
        let Self {
            coordinator,
            display,
            live,
        } = self;
        live.shutdown().await;
        coordinator.shutdown().await;
        display.shutdown().await;
    }
}
