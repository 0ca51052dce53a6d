//! Global atomic counters for review-cycle observability.
//!
//! Counters are bumped silently at the call site. [`Metrics::flush`] emits
//! the current values as a single `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

/// Lock-free counters.
pub struct Metrics {
    cycles_completed: AtomicU64,
    iterations_recorded: AtomicU64,
    conflicts_auto_resolved: AtomicU64,
    escalations: AtomicU64,
    follow_ups_filed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            cycles_completed: AtomicU64::new(0),
            iterations_recorded: AtomicU64::new(0),
            conflicts_auto_resolved: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            follow_ups_filed: AtomicU64::new(0),
        }
    }

    pub fn inc_cycles_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cycles_completed", "counter incremented");
    }

    pub fn inc_iterations_recorded(&self) {
        self.iterations_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations_recorded", "counter incremented");
    }

    /// Count one auto-resolved conflict batch.
    pub fn inc_conflicts_auto_resolved(&self) {
        self.conflicts_auto_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "conflicts_auto_resolved", "counter incremented");
    }

    pub fn inc_escalations(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "escalations", "counter incremented");
    }

    pub fn inc_follow_ups_filed(&self) {
        self.follow_ups_filed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "follow_ups_filed", "counter incremented");
    }

    /// Emit all current counter values as one `info!` event.
    ///
    /// Call at natural boundaries (end of a cycle, end of a CLI command).
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            cycles_completed = self.cycles_completed(),
            iterations_recorded = self.iterations_recorded(),
            conflicts_auto_resolved = self.conflicts_auto_resolved(),
            escalations = self.escalations(),
            follow_ups_filed = self.follow_ups_filed(),
        );
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn iterations_recorded(&self) -> u64 {
        self.iterations_recorded.load(Ordering::Relaxed)
    }

    pub fn conflicts_auto_resolved(&self) -> u64 {
        self.conflicts_auto_resolved.load(Ordering::Relaxed)
    }

    pub fn escalations(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    pub fn follow_ups_filed(&self) -> u64 {
        self.follow_ups_filed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.cycles_completed.store(0, Ordering::Relaxed);
        self.iterations_recorded.store(0, Ordering::Relaxed);
        self.conflicts_auto_resolved.store(0, Ordering::Relaxed);
        self.escalations.store(0, Ordering::Relaxed);
        self.follow_ups_filed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_cycles_completed();
        m.inc_iterations_recorded();
        m.inc_iterations_recorded();
        m.inc_escalations();
        assert_eq!(m.cycles_completed(), 1);
        assert_eq!(m.iterations_recorded(), 2);
        assert_eq!(m.escalations(), 1);
        assert_eq!(m.conflicts_auto_resolved(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_follow_ups_filed();
        m.inc_conflicts_auto_resolved();
        m.reset();
        assert_eq!(m.follow_ups_filed(), 0);
        assert_eq!(m.conflicts_auto_resolved(), 0);
    }
}
