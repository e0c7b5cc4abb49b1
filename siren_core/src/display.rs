//! Notification display scheduling.
//!
//! One envelope is on screen at a time and stays there for at least the configured
//! dwell. Envelopes that arrive meanwhile wait in FIFO order.

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::config::DisplayConfig;
use crate::envelope::PushEnvelope;

/// An envelope waiting for the display slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayQueueEntry {
    /// Arrival order, starting at 0.
    pub seq: u64,
    /// The envelope to show.
    pub envelope: PushEnvelope,
}

/// The envelope currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownNotification {
    /// The entry being shown.
    pub entry: DisplayQueueEntry,
    /// When it was put on screen.
    pub shown_at: Instant,
}

/// Single-slot, minimum-dwell display queue.
///
/// The scheduler is a plain state machine driven by explicit timestamps;
/// [`DisplayScheduler::spawn`] runs it against the tokio clock.
#[derive(Debug)]
pub struct DisplayScheduler {
    queue: VecDeque<DisplayQueueEntry>,
    current: Option<ShownNotification>,
    next_seq: u64,
    config: DisplayConfig,
}

impl DisplayScheduler {
    /// Creates an empty scheduler.
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            next_seq: 0,
            config,
        }
    }

    /// Appends an envelope to the queue and returns its arrival order.
    pub fn enqueue(&mut self, envelope: PushEnvelope) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(DisplayQueueEntry { seq, envelope });
        seq
    }

    /// Updates the slot at `now` and returns the newly shown notification, if the slot
    /// changed.
    ///
    /// An empty slot takes the head of the queue right away. An occupied slot is handed
    /// to the next entry only once the dwell has elapsed. Calling this again without an
    /// intervening change is a no-op.
    pub fn evaluate(&mut self, now: Instant) -> Option<ShownNotification> {
        let ready = match &self.current {
            None => true,
            Some(shown) => now.saturating_duration_since(shown.shown_at) >= self.config.dwell,
        };
        if !ready {
            return None;
        }
        let entry = self.queue.pop_front()?;
        let shown = ShownNotification {
            entry,
            shown_at: now,
        };
        self.current = Some(shown.clone());
        Some(shown)
    }

    /// How long until [`evaluate`](Self::evaluate) may change the slot. `None` when
    /// nothing is waiting.
    pub fn next_check(&self, now: Instant) -> Option<Duration> {
        if self.queue.is_empty() {
            return None;
        }
        match &self.current {
            None => Some(Duration::ZERO),
            Some(shown) => Some(
                self.config
                    .dwell
                    .saturating_sub(now.saturating_duration_since(shown.shown_at)),
            ),
        }
    }

    /// The notification on screen.
    pub fn current(&self) -> Option<&ShownNotification> {
        self.current.as_ref()
    }

    /// Number of envelopes waiting.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Starts a task that drives the scheduler with the tokio clock.
    pub fn spawn(self) -> DisplayHandle {
        let (envelope_tx, envelope_rx) = mpsc::unbounded_channel();
        let (current_tx, current_rx) = watch::channel(None);
        let task = tokio::spawn(self.run(envelope_rx, current_tx));
        DisplayHandle {
            envelopes: envelope_tx,
            current: current_rx,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut envelopes: mpsc::UnboundedReceiver<PushEnvelope>,
        current: watch::Sender<Option<ShownNotification>>,
    ) {
        loop {
            let now = Instant::now();
            if let Some(shown) = self.evaluate(now) {
                debug!(
                    "Showing {} ({}), {} queued",
                    shown.entry.envelope.identifier,
                    shown.entry.envelope.event,
                    self.queue.len()
                );
                current.send_replace(Some(shown));
            }

            let wake = self.next_check(now).map(|delay| now + delay);
            tokio::select! {
                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => {
                        self.enqueue(envelope);
                    }
                    None => break,
                },
                _ = sleep_until(wake.unwrap_or(now)), if wake.is_some() => {}
            }
        }
        debug!("Display scheduler stopped");
    }
}

/// Handle to a running [`DisplayScheduler`]. Dropping it stops the task and its timer.
pub struct DisplayHandle {
    envelopes: mpsc::UnboundedSender<PushEnvelope>,
    current: watch::Receiver<Option<ShownNotification>>,
    task: Option<JoinHandle<()>>,
}

impl DisplayHandle {
    /// Queues an envelope for display. Returns `false` once the scheduler has stopped.
    pub fn submit(&self, envelope: PushEnvelope) -> bool {
        self.envelopes.send(envelope).is_ok()
    }

    /// A sender that feeds the scheduler.
    pub fn sender(&self) -> mpsc::UnboundedSender<PushEnvelope> {
        self.envelopes.clone()
    }

    /// The notification on screen.
    pub fn current(&self) -> Option<ShownNotification> {
        self.current.borrow().clone()
    }

    /// Receiver notified whenever the slot changes.
    pub fn notifications(&self) -> watch::Receiver<Option<ShownNotification>> {
        self.current.clone()
    }

    /// Stops the scheduler and waits for it.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Display scheduler task failed: {}", e);
                }
            }
        }
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
