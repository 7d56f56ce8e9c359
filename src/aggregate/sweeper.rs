//! Expiration sweeping.
//!
//! Runs synchronously at the start of every protocol operation, under the
//! same lock as the operation itself. Each run is a full scan over the
//! registry; a timer-driven sweep or an expiration index would be needed for
//! large slice counts.

use super::state::AggregateState;
use chrono::{DateTime, Utc};

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// URNs of slices reclaimed.
    pub expired_slices: Vec<String>,
    /// Resources returned to the pool.
    pub released_resources: usize,
}

impl SweepReport {
    /// Check if the sweep changed anything.
    pub fn is_empty(&self) -> bool {
        self.expired_slices.is_empty()
    }
}

/// Reclaims slices whose expiration has passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationSweeper;

impl ExpirationSweeper {
    /// Create a sweeper.
    pub fn new() -> Self {
        Self
    }

    /// Reset and remove every slice with `expiration < now`.
    pub fn sweep(&self, state: &mut AggregateState, now: DateTime<Utc>) -> SweepReport {
        let expired = state.registry.expired(now);
        let mut report = SweepReport::default();

        for urn in expired {
            report.released_resources += state.release_slice(&urn);
            tracing::info!(slice_urn = %urn, "slice expired");
            report.expired_slices.push(urn);
        }

        tracing::debug!(
            expired = report.expired_slices.len(),
            released = report.released_resources,
            "expiration sweep complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::catalog::ResourceStatus;

    fn bound_state(now: DateTime<Utc>) -> AggregateState {
        let mut state = AggregateState::new(3, "fakevm");
        let ids: Vec<_> = state.catalog.all().map(|r| r.id).collect();

        let slice = state
            .registry
            .create("urn:old", now - chrono::Duration::seconds(5))
            .unwrap();
        slice.add_resource(ids[0]);
        slice.add_resource(ids[1]);
        state.catalog.bind(ids[0], "a");
        state.catalog.bind(ids[1], "b");
        state.catalog.set_status(ids[1], ResourceStatus::Shutdown);

        let slice = state
            .registry
            .create("urn:live", now + chrono::Duration::seconds(5))
            .unwrap();
        slice.add_resource(ids[2]);
        state.catalog.bind(ids[2], "c");
        state
    }

    #[test]
    fn test_sweep_reclaims_expired() {
        let now = Utc::now();
        let mut state = bound_state(now);

        let report = ExpirationSweeper::new().sweep(&mut state, now);
        assert_eq!(report.expired_slices, vec!["urn:old".to_string()]);
        assert_eq!(report.released_resources, 2);

        assert!(!state.registry.contains("urn:old"));
        assert!(state.registry.contains("urn:live"));
        assert_eq!(state.catalog.available_count(), 2);
        assert!(state
            .catalog
            .available(true)
            .all(|r| r.status == ResourceStatus::Unconfigured));
    }

    #[test]
    fn test_sweep_idempotent() {
        let now = Utc::now();
        let mut state = bound_state(now);
        let sweeper = ExpirationSweeper::new();

        sweeper.sweep(&mut state, now);
        let snapshot: Vec<_> = state.catalog.all().cloned().collect();

        let second = sweeper.sweep(&mut state, now);
        assert!(second.is_empty());
        assert_eq!(second.released_resources, 0);
        assert_eq!(state.catalog.all().cloned().collect::<Vec<_>>(), snapshot);
        assert_eq!(state.registry.len(), 1);
    }

    #[test]
    fn test_sweep_keeps_lease_at_exact_expiration() {
        let now = Utc::now();
        let mut state = AggregateState::new(1, "fakevm");
        state.registry.create("urn:edge", now).unwrap();

        let report = ExpirationSweeper::new().sweep(&mut state, now);
        assert!(report.is_empty());
        assert!(state.registry.contains("urn:edge"));
    }
}
