//! Engine counters
//!
//! Counters only, monotonic, reset on process start.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters
///
/// # Thread Safety
///
/// All counters use atomic operations with Relaxed ordering.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    plans_rejected: AtomicU64,
    reads_executed: AtomicU64,
    writes_committed: AtomicU64,
    writes_aborted: AtomicU64,
    writes_rejected: AtomicU64,
    guards_triggered: AtomicU64,
    dry_runs: AtomicU64,
    pending_saved: AtomicU64,
    pending_cleared: AtomicU64,
    pending_expired: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_plans_rejected(&self) {
        self.plans_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.reads_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes_committed(&self) {
        self.writes_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes_aborted(&self) {
        self.writes_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes_rejected(&self) {
        self.writes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_guards(&self) {
        self.guards_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dry_runs(&self) {
        self.dry_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pending_saved(&self) {
        self.pending_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pending_cleared(&self) {
        self.pending_cleared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pending_expired(&self, n: u64) {
        self.pending_expired.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            plans_rejected: self.plans_rejected.load(Ordering::Relaxed),
            reads_executed: self.reads_executed.load(Ordering::Relaxed),
            writes_committed: self.writes_committed.load(Ordering::Relaxed),
            writes_aborted: self.writes_aborted.load(Ordering::Relaxed),
            writes_rejected: self.writes_rejected.load(Ordering::Relaxed),
            guards_triggered: self.guards_triggered.load(Ordering::Relaxed),
            dry_runs: self.dry_runs.load(Ordering::Relaxed),
            pending_saved: self.pending_saved.load(Ordering::Relaxed),
            pending_cleared: self.pending_cleared.load(Ordering::Relaxed),
            pending_expired: self.pending_expired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub plans_rejected: u64,
    pub reads_executed: u64,
    pub writes_committed: u64,
    pub writes_aborted: u64,
    pub writes_rejected: u64,
    pub guards_triggered: u64,
    pub dry_runs: u64,
    pub pending_saved: u64,
    pub pending_cleared: u64,
    pub pending_expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_reads();
        registry.increment_reads();
        registry.increment_writes_committed();
        registry.increment_guards();
        registry.add_pending_expired(3);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.reads_executed, 2);
        assert_eq!(snapshot.writes_committed, 1);
        assert_eq!(snapshot.guards_triggered, 1);
        assert_eq!(snapshot.pending_expired, 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_dry_runs();

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["dry_runs"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_reads();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().reads_executed, 800);
    }
}
