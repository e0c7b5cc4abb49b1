//! Process-wide timing and sizing constants, and the configuration structs that carry them.

use std::time::Duration;

/// Idle window after the last arrival before the pending identifiers are flushed.
pub const BATCH_WAIT: Duration = Duration::from_millis(800);

/// Maximum number of identifiers requested from the authoritative service in one call.
pub const BATCH_MAX: usize = 25;

/// Minimum time a notification stays on screen before it can be replaced.
pub const DWELL: Duration = Duration::from_millis(10_000);

/// Configuration for the [`IngestionCoordinator`](crate::coordinator::IngestionCoordinator).
///
/// Fixed once the coordinator is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Debounce window, re-armed on every accepted arrival.
    pub batch_wait: Duration,
    /// Upper bound on identifiers drained by a single flush.
    pub batch_max: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_wait: BATCH_WAIT,
            batch_max: BATCH_MAX,
        }
    }
}

/// Configuration for the [`DisplayScheduler`](crate::display::DisplayScheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Minimum dwell time of the shown notification.
    pub dwell: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { dwell: DWELL }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let coordinator = CoordinatorConfig::default();
        assert_eq!(coordinator.batch_wait, Duration::from_millis(800));
        assert_eq!(coordinator.batch_max, 25);
        assert_eq!(DisplayConfig::default().dwell, Duration::from_secs(10));
    }
}
