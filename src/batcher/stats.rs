use crate::batcher::batch::FlushTrigger;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between ingestion handles and the emit loop.
#[derive(Debug, Default)]
pub struct StatsCounters {
    ingested: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    size_batches: AtomicU64,
    time_batches: AtomicU64,
    drain_batches: AtomicU64,
    emitted_records: AtomicU64,
}

impl StatsCounters {
    pub fn record_ingested(&self) {
        self.ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the dropped total including this drop
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, trigger: FlushTrigger, size: usize) {
        let counter = match trigger {
            FlushTrigger::Size => &self.size_batches,
            FlushTrigger::Time => &self.time_batches,
            FlushTrigger::Drain => &self.drain_batches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.emitted_records.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_depth: usize) -> BatcherStats {
        BatcherStats {
            records_ingested: self.ingested.load(Ordering::Relaxed),
            records_dropped: self.dropped.load(Ordering::Relaxed),
            records_rejected: self.rejected.load(Ordering::Relaxed),
            records_emitted: self.emitted_records.load(Ordering::Relaxed),
            size_batches: self.size_batches.load(Ordering::Relaxed),
            time_batches: self.time_batches.load(Ordering::Relaxed),
            drain_batches: self.drain_batches.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

/// Point-in-time view of batcher activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    pub records_ingested: u64,
    pub records_dropped: u64,
    pub records_rejected: u64,
    pub records_emitted: u64,
    pub size_batches: u64,
    pub time_batches: u64,
    pub drain_batches: u64,
    pub queue_depth: usize,
}

impl BatcherStats {
    pub fn batches_emitted(&self) -> u64 {
        self.size_batches + self.time_batches + self.drain_batches
    }
}
