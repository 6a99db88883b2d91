//! Lightweight global metrics for snapgen.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Sequencer
//! - Builds
//! - Publication
//! - Retention

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Sequencer -----
static GENERATIONS_ALLOCATED: AtomicU64 = AtomicU64::new(0);

// ----- Builds -----
static BUILDS_COMMITTED: AtomicU64 = AtomicU64::new(0);
static BUILDS_FAILED: AtomicU64 = AtomicU64::new(0);
static DOCUMENTS_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Publication -----
static PUBLISHES: AtomicU64 = AtomicU64::new(0);
static PUBLISHES_SUPERSEDED: AtomicU64 = AtomicU64::new(0);

// ----- Retention -----
static RETENTION_RUNS: AtomicU64 = AtomicU64::new(0);
static GENERATIONS_DROPPED: AtomicU64 = AtomicU64::new(0);
static COLLECTIONS_DROPPED: AtomicU64 = AtomicU64::new(0);
static RETENTION_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub generations_allocated: u64,

    pub builds_committed: u64,
    pub builds_failed: u64,
    pub documents_written: u64,

    pub publishes: u64,
    pub publishes_superseded: u64,

    pub retention_runs: u64,
    pub generations_dropped: u64,
    pub collections_dropped: u64,
    pub retention_failures: u64,
}

impl MetricsSnapshot {
    pub fn build_failure_ratio(&self) -> f64 {
        let total = self.builds_committed + self.builds_failed;
        if total == 0 {
            0.0
        } else {
            self.builds_failed as f64 / total as f64
        }
    }
}

pub fn record_generation_allocated() {
    GENERATIONS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_build_committed() {
    BUILDS_COMMITTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_build_failed() {
    BUILDS_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_document_written() {
    DOCUMENTS_WRITTEN.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish() {
    PUBLISHES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_superseded() {
    PUBLISHES_SUPERSEDED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_retention_run() {
    RETENTION_RUNS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_generation_dropped(collections: usize) {
    GENERATIONS_DROPPED.fetch_add(1, Ordering::Relaxed);
    COLLECTIONS_DROPPED.fetch_add(collections as u64, Ordering::Relaxed);
}

pub fn record_retention_failure() {
    RETENTION_FAILURES.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        generations_allocated: GENERATIONS_ALLOCATED.load(Ordering::Relaxed),

        builds_committed: BUILDS_COMMITTED.load(Ordering::Relaxed),
        builds_failed: BUILDS_FAILED.load(Ordering::Relaxed),
        documents_written: DOCUMENTS_WRITTEN.load(Ordering::Relaxed),

        publishes: PUBLISHES.load(Ordering::Relaxed),
        publishes_superseded: PUBLISHES_SUPERSEDED.load(Ordering::Relaxed),

        retention_runs: RETENTION_RUNS.load(Ordering::Relaxed),
        generations_dropped: GENERATIONS_DROPPED.load(Ordering::Relaxed),
        collections_dropped: COLLECTIONS_DROPPED.load(Ordering::Relaxed),
        retention_failures: RETENTION_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    GENERATIONS_ALLOCATED.store(0, Ordering::Relaxed);

    BUILDS_COMMITTED.store(0, Ordering::Relaxed);
    BUILDS_FAILED.store(0, Ordering::Relaxed);
    DOCUMENTS_WRITTEN.store(0, Ordering::Relaxed);

    PUBLISHES.store(0, Ordering::Relaxed);
    PUBLISHES_SUPERSEDED.store(0, Ordering::Relaxed);

    RETENTION_RUNS.store(0, Ordering::Relaxed);
    GENERATIONS_DROPPED.store(0, Ordering::Relaxed);
    COLLECTIONS_DROPPED.store(0, Ordering::Relaxed);
    RETENTION_FAILURES.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    // counters are process-wide and other tests run in parallel: only check deltas
    #[test]
    fn counters_move_forward() {
        let before = snapshot();
        record_build_committed();
        record_build_failed();
        record_generation_dropped(3);
        let after = snapshot();
        assert!(after.builds_committed > before.builds_committed);
        assert!(after.builds_failed > before.builds_failed);
        assert!(after.collections_dropped >= before.collections_dropped + 3);
        assert!(after.build_failure_ratio() > 0.0);
    }

    #[test]
    fn failure_ratio_of_empty_snapshot_is_zero() {
        assert_eq!(MetricsSnapshot::default().build_failure_ratio(), 0.0);
    }
}
