use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

/// Process-wide counters describing numbering activity.
#[derive(Debug, Default)]
pub struct NumberingMetrics {
    lock_retries: AtomicU64,
    lock_fallbacks: AtomicU64,
    recomputes: AtomicU64,
    numbers_rewritten: AtomicU64,
}

/// Point-in-time copy of [`NumberingMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NumberingMetricsSnapshot {
    /// Season lock attempts that had to be repeated.
    pub lock_retries: u64,
    /// Operations that ran without the season lock after exhausting retries.
    pub lock_fallbacks: u64,
    /// Completed season recomputes.
    pub recomputes: u64,
    /// Cells whose numbers a recompute changed.
    pub numbers_rewritten: u64,
}

impl NumberingMetrics {
    pub fn record_lock_retry(&self) {
        self.lock_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_fallback(&self) {
        self.lock_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recompute(&self, rewritten: usize) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
        self.numbers_rewritten
            .fetch_add(rewritten as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NumberingMetricsSnapshot {
        NumberingMetricsSnapshot {
            lock_retries: self.lock_retries.load(Ordering::Relaxed),
            lock_fallbacks: self.lock_fallbacks.load(Ordering::Relaxed),
            recomputes: self.recomputes.load(Ordering::Relaxed),
            numbers_rewritten: self.numbers_rewritten.load(Ordering::Relaxed),
        }
    }
}
