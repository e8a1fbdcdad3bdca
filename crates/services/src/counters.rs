use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide correction ingestion counters. Monotonic, lock-free.
#[derive(Debug, Default)]
pub struct CorrectionCounters {
    ingest_total: AtomicU64,
    dedup_events: AtomicU64,
    dedup_words: AtomicU64,
    failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub ingest_total: u64,
    pub dedup_events: u64,
    pub dedup_words: u64,
    pub failures_total: u64,
}

impl CorrectionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a committed ingestion.
    pub fn record_ingest(&self, created: bool, deduped_words: u64) {
        if created {
            self.ingest_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dedup_events.fetch_add(1, Ordering::Relaxed);
        }
        if deduped_words > 0 {
            self.dedup_words.fetch_add(deduped_words, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            ingest_total: self.ingest_total.load(Ordering::Relaxed),
            dedup_events: self.dedup_events.load(Ordering::Relaxed),
            dedup_words: self.dedup_words.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
        }
    }
}
