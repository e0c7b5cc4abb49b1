//! The ingestion coordinator.
//!
//! Turns the live envelope stream into bounded batch lookups. One task owns the pending
//! identifier set and the debounce deadline; envelopes and control commands reach it over
//! channels, so there is no shared mutable state besides the caches (written only through
//! the [`CacheMerger`]).
//!
//! ```text
//!   Idle ──accepted envelope──▶ Accumulating ──quiet for batch_wait──▶ Flushing
//!                                   ▲   │ re-arm on each arrival          │
//!                                   └───┘                                 │
//!   Idle ◀──────── fetch done, nothing pending ───────────────────────────┤
//!                  fetch done, more pending: next flush right away ───────┘
//! ```

use std::collections::HashSet;
use std::ops::ControlFlow;

use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::alert::AlertRecord;
use crate::cache::{AlertCaches, CacheMerger, MergeSummary};
use crate::config::CoordinatorConfig;
use crate::envelope::{Action, PushEnvelope};
use crate::lookup::AlertLookup;
use crate::topology::Feature;

/// Observable state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing pending, no flush scheduled.
    Idle,
    /// Identifiers pending, debounce deadline armed.
    Accumulating,
    /// A batch lookup is in flight.
    Flushing,
}

/// Point-in-time view of the coordinator, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    /// Current state.
    pub state: CoordinatorState,
    /// Pending identifiers, sorted.
    pub pending: Vec<String>,
}

enum Command {
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
    Shutdown,
}

/// The pending identifier set and its debounce deadline.
struct PendingSet {
    identifiers: HashSet<String>,
    deadline: Option<Instant>,
}

impl PendingSet {
    fn insert(&mut self, identifier: String, config: &CoordinatorConfig) {
        self.identifiers.insert(identifier);
        self.deadline = Some(Instant::now() + config.batch_wait);
    }

    /// Removes and returns up to `max` identifiers.
    fn take(&mut self, max: usize) -> Vec<String> {
        let batch: Vec<String> = self.identifiers.iter().take(max).cloned().collect();
        for identifier in &batch {
            self.identifiers.remove(identifier);
        }
        batch
    }

    fn sorted(&self) -> Vec<String> {
        let mut pending: Vec<String> = self.identifiers.iter().cloned().collect();
        pending.sort();
        pending
    }
}

/// Batches lookups for the identifiers announced on the live channel.
pub struct IngestionCoordinator<L: AlertLookup> {
    lookup: L,
    merger: CacheMerger,
    caches: AlertCaches,
    config: CoordinatorConfig,
    pending: PendingSet,
    state: watch::Sender<CoordinatorState>,
}

impl<L: AlertLookup + 'static> IngestionCoordinator<L> {
    /// Creates a coordinator that owns `merger`.
    pub fn new(lookup: L, merger: CacheMerger, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        Self {
            lookup,
            caches: merger.caches(),
            merger,
            config,
            pending: PendingSet {
                identifiers: HashSet::new(),
                deadline: None,
            },
            state,
        }
    }

    /// Read handle over the caches this coordinator fills.
    pub fn caches(&self) -> AlertCaches {
        self.caches.clone()
    }

    /// Seeds the caches with the currently active alerts.
    pub async fn seed(&self) -> Result<MergeSummary, L::Error> {
        let records = self.lookup.fetch_active().await?;
        let features = match missing_geometry(&records) {
            missing if missing.is_empty() => Vec::new(),
            missing => match self.lookup.fetch_geometry(&missing).await?.features() {
                Ok(features) => features,
                Err(e) => {
                    error!("Failed to expand seed geometry: {}", e);
                    Vec::new()
                }
            },
        };
        let summary = self.merger.merge(records, features).await;
        info!("Seeded caches with {} active alerts", summary.alerts);
        Ok(summary)
    }

    /// Starts the coordinator task.
    pub fn spawn(self) -> CoordinatorHandle {
        let (envelope_tx, envelope_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = self.state.subscribe();
        let caches = self.caches.clone();
        let task = tokio::spawn(self.run(envelope_rx, command_rx));
        CoordinatorHandle {
            envelopes: envelope_tx,
            commands: command_tx,
            state,
            caches,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut envelopes: mpsc::UnboundedReceiver<PushEnvelope>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        debug!("Ingestion coordinator started");
        loop {
            let deadline = self.pending.deadline;
            tokio::select! {
                biased;
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => {
                        if accept(&self.caches, &mut self.pending, &self.config, envelope).await {
                            self.state.send_if_modified(|state| {
                                let changed = *state != CoordinatorState::Accumulating;
                                *state = CoordinatorState::Accumulating;
                                changed
                            });
                        }
                    }
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.drain(&mut envelopes, &mut commands).await.is_break() {
                        break;
                    }
                }
            }
        }
        debug!("Ingestion coordinator stopped");
    }

    /// Flushes until nothing is pending. Breaks on shutdown.
    async fn drain(
        &mut self,
        envelopes: &mut mpsc::UnboundedReceiver<PushEnvelope>,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> ControlFlow<()> {
        self.pending.deadline = None;
        let _ = self.state.send_replace(CoordinatorState::Flushing);

        while !self.pending.identifiers.is_empty() {
            let batch = self.pending.take(self.config.batch_max.max(1));
            debug!(
                "Flushing {} identifiers, {} left pending",
                batch.len(),
                self.pending.identifiers.len()
            );

            let fetch = fetch_batch(&self.lookup, &self.merger, &batch);
            tokio::pin!(fetch);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut fetch => break,
                    envelope = envelopes.recv() => match envelope {
                        Some(envelope) => {
                            accept(&self.caches, &mut self.pending, &self.config, envelope).await;
                        }
                        None => return ControlFlow::Break(()),
                    },
                    command = commands.recv() => match command {
                        Some(Command::Snapshot(reply)) => {
                            let _ = reply.send(CoordinatorSnapshot {
                                state: CoordinatorState::Flushing,
                                pending: self.pending.sorted(),
                            });
                        }
                        Some(Command::Shutdown) | None => return ControlFlow::Break(()),
                    },
                }
            }
        }

        self.pending.deadline = None;
        let _ = self.state.send_replace(CoordinatorState::Idle);
        ControlFlow::Continue(())
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            state: *self.state.borrow(),
            pending: self.pending.sorted(),
        }
    }
}

/// Adds the envelope's identifier to the pending set unless it's a revision of an alert
/// that is already cached.
async fn accept(
    caches: &AlertCaches,
    pending: &mut PendingSet,
    config: &CoordinatorConfig,
    envelope: PushEnvelope,
) -> bool {
    if envelope.action != Action::New && caches.contains_alert(&envelope.identifier).await {
        debug!(
            "Suppressing {:?} for cached alert {}",
            envelope.action, envelope.identifier
        );
        return false;
    }
    pending.insert(envelope.identifier, config);
    true
}

fn missing_geometry(records: &[AlertRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|record| record.native_polygon().is_none())
        .map(|record| record.identifier.clone())
        .collect()
}

/// One detail lookup, plus a geometry lookup for records without a native polygon.
///
/// Failures are logged and the batch is dropped.
async fn fetch_batch<L: AlertLookup>(lookup: &L, merger: &CacheMerger, batch: &[String]) {
    let records = match lookup.fetch_alerts(batch).await {
        Ok(records) => records,
        Err(e) => {
            error!("Alert lookup failed, dropping {:?}: {}", batch, e);
            return;
        }
    };

    let missing = missing_geometry(&records);
    let features: Vec<Feature> = if missing.is_empty() {
        Vec::new()
    } else {
        let topology = match lookup.fetch_geometry(&missing).await {
            Ok(topology) => topology,
            Err(e) => {
                error!("Geometry lookup failed, dropping {:?}: {}", batch, e);
                return;
            }
        };
        match topology.features() {
            Ok(features) => features,
            Err(e) => {
                error!("Invalid geometry for {:?}, dropping batch: {}", missing, e);
                return;
            }
        }
    };

    merger.merge(records, features).await;
}

/// Handle to a running [`IngestionCoordinator`]. Dropping it stops the task.
pub struct CoordinatorHandle {
    envelopes: mpsc::UnboundedSender<PushEnvelope>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CoordinatorState>,
    caches: AlertCaches,
    task: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Hands an envelope to the coordinator. Returns `false` once it has stopped.
    pub fn submit(&self, envelope: PushEnvelope) -> bool {
        self.envelopes.send(envelope).is_ok()
    }

    /// A sender that feeds the coordinator, for producers living in other tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<PushEnvelope> {
        self.envelopes.clone()
    }

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Receiver notified on state changes.
    pub fn states(&self) -> watch::Receiver<CoordinatorState> {
        self.state.clone()
    }

    /// Read handle over the caches.
    pub fn caches(&self) -> AlertCaches {
        self.caches.clone()
    }

    /// Asks the coordinator for a snapshot, after every envelope submitted so far has
    /// been processed. `None` once it has stopped.
    pub async fn snapshot(&self) -> Option<CoordinatorSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    /// Stops the coordinator, dropping its timer, and waits for the task to end.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Ingestion coordinator task failed: {}", e);
            }
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDetail, LifecycleState, PhenomenonState};
    use crate::topology::Topology;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup unavailable")]
    struct Unavailable;

    /// Records every call with the (paused) time it was made at.
    #[derive(Clone, Default)]
    struct RecordingLookup {
        calls: Arc<Mutex<Vec<(Duration, Vec<String>)>>>,
        failing: bool,
        start: Option<Instant>,
    }

    impl RecordingLookup {
        fn new(failing: bool) -> Self {
            Self {
                calls: Arc::default(),
                failing,
                start: Some(Instant::now()),
            }
        }

        fn calls(&self) -> Vec<(Duration, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn record(identifier: &str) -> AlertRecord {
        AlertRecord::from_parts(
            PhenomenonState {
                identifier: identifier.into(),
                state: LifecycleState::Active,
                most_recent_detail_ref: format!("{identifier}-cap"),
                history: vec![],
                areas: vec![],
            },
            AlertDetail {
                identifier: format!("{identifier}-cap"),
                event: "Test Warning".into(),
                ..Default::default()
            },
        )
    }

    #[async_trait]
    impl AlertLookup for RecordingLookup {
        type Error = Unavailable;

        async fn fetch_alerts(&self, identifiers: &[String]) -> Result<Vec<AlertRecord>, Unavailable> {
            let elapsed = self.start.map(|s| s.elapsed()).unwrap_or_default();
            let mut sorted = identifiers.to_vec();
            sorted.sort();
            self.calls.lock().unwrap().push((elapsed, sorted));
            if self.failing {
                return Err(Unavailable);
            }
            Ok(identifiers.iter().map(|id| record(id)).collect())
        }

        async fn fetch_geometry(&self, _identifiers: &[String]) -> Result<Topology, Unavailable> {
            Ok(Topology::default())
        }

        async fn fetch_active(&self) -> Result<Vec<AlertRecord>, Unavailable> {
            Ok(vec![record("SEED")])
        }
    }

    fn envelope(identifier: &str, action: Action) -> PushEnvelope {
        PushEnvelope {
            identifier: identifier.into(),
            action,
            event: "Test Warning".into(),
            event_code: "TOW".into(),
            sender: "NWS".into(),
        }
    }

    fn spawn(lookup: &RecordingLookup) -> CoordinatorHandle {
        IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), CoordinatorConfig::default())
            .spawn()
    }

    // ========================================================================
    // Debounce
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn single_new_envelope_is_fetched_after_quiet_window() {
        let lookup = RecordingLookup::new(false);
        let handle = spawn(&lookup);

        assert!(handle.submit(envelope("X1", Action::New)));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, CoordinatorState::Accumulating);
        assert_eq!(snapshot.pending, vec!["X1".to_string()]);

        tokio::time::sleep(Duration::from_millis(799)).await;
        assert!(lookup.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        handle.snapshot().await.unwrap();
        assert_eq!(
            lookup.calls(),
            vec![(Duration::from_millis(800), vec!["X1".to_string()])]
        );
        assert!(handle.caches().contains_alert("X1").await);
        assert_eq!(handle.state(), CoordinatorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_flush() {
        let lookup = RecordingLookup::new(false);
        let handle = spawn(&lookup);

        handle.submit(envelope("A", Action::New));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.submit(envelope("B", Action::New));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.submit(envelope("C", Action::New));

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        handle.snapshot().await.unwrap();

        assert_eq!(
            lookup.calls(),
            vec![(
                Duration::from_millis(1_000),
                vec!["A".to_string(), "B".to_string(), "C".to_string()]
            )]
        );
    }

    // ========================================================================
    // Batching
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn flush_is_capped_and_remainder_follows_immediately() {
        let lookup = RecordingLookup::new(false);
        let handle = spawn(&lookup);

        for i in 0..30 {
            handle.submit(envelope(&format!("ID{i:02}"), Action::New));
        }
        tokio::time::sleep(Duration::from_millis(900)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, CoordinatorState::Idle);
        assert!(snapshot.pending.is_empty());

        let calls = lookup.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.len(), 25);
        assert_eq!(calls[1].1.len(), 5);
        assert_eq!(calls[0].0, Duration::from_millis(800));
        assert_eq!(calls[1].0, Duration::from_millis(800));
        assert_eq!(handle.caches().alert_count().await, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_batch_max_still_drains_one_at_a_time() {
        let lookup = RecordingLookup::new(false);
        let config = CoordinatorConfig {
            batch_max: 0,
            ..CoordinatorConfig::default()
        };
        let handle = IngestionCoordinator::new(lookup.clone(), CacheMerger::new(), config).spawn();

        handle.submit(envelope("A", Action::New));
        handle.submit(envelope("B", Action::New));
        tokio::time::sleep(Duration::from_millis(900)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, CoordinatorState::Idle);
        assert!(snapshot.pending.is_empty());

        let calls = lookup.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, batch)| batch.len() == 1));
        assert_eq!(handle.caches().alert_count().await, 2);
    }

    // ========================================================================
    // Suppression and failures
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn revisions_of_cached_alerts_are_suppressed() {
        let lookup = RecordingLookup::new(false);
        let coordinator = IngestionCoordinator::new(
            lookup.clone(),
            CacheMerger::new(),
            CoordinatorConfig::default(),
        );
        coordinator.seed().await.unwrap();
        let handle = coordinator.spawn();

        handle.submit(envelope("SEED", Action::Update));
        handle.submit(envelope("SEED", Action::Cancel));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, CoordinatorState::Idle);
        assert!(snapshot.pending.is_empty());

        // Unknown identifiers are fetched whatever the action, and New always is.
        handle.submit(envelope("OTHER", Action::Update));
        handle.submit(envelope("SEED", Action::New));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.pending, vec!["OTHER".to_string(), "SEED".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_does_not_requeue() {
        let lookup = RecordingLookup::new(true);
        let handle = spawn(&lookup);

        handle.submit(envelope("A", Action::New));
        handle.submit(envelope("B", Action::New));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.state, CoordinatorState::Idle);
        assert_eq!(lookup.calls().len(), 1);
        assert_eq!(handle.caches().alert_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_the_pending_timer() {
        let lookup = RecordingLookup::new(false);
        let handle = spawn(&lookup);
        handle.submit(envelope("A", Action::New));
        handle.snapshot().await.unwrap();

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(lookup.calls().is_empty());
    }
}
