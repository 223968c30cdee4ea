use crate::batcher::stats::StatsCounters;
use crate::config::types::BackpressureStrategy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Errors returned to producers. Both variants hand the record back.
#[derive(Debug, Error)]
pub enum IngestError<T> {
    #[error("ingest queue is full")]
    QueueOverflow(T),

    #[error("batcher has been stopped")]
    Stopped(T),
}

impl<T> IngestError<T> {
    pub fn into_inner(self) -> T {
        match self {
            IngestError::QueueOverflow(record) | IngestError::Stopped(record) => record,
        }
    }
}

/// Multi-producer, single-consumer FIFO between producers and the emit loop.
///
/// Capacity is optional; when `buffer_limit` is `None` the queue is bounded
/// only by memory and the strategy never applies.
pub struct IngestQueue<T> {
    inner: Mutex<QueueInner<T>>,
    readable: Notify,
    writable: Notify,
    buffer_limit: Option<usize>,
    strategy: BackpressureStrategy,
    cancel: CancellationToken,
    stats: Arc<StatsCounters>,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

enum Offer<T> {
    Enqueued,
    Dropped,
    Full(T),
}

impl<T> IngestQueue<T> {
    pub fn new(
        buffer_limit: Option<usize>,
        strategy: BackpressureStrategy,
        cancel: CancellationToken,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                closed: false,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
            buffer_limit,
            strategy,
            cancel,
            stats,
        }
    }

    /// Enqueue a record, waiting for space under the `block` strategy.
    pub async fn push(&self, mut record: T) -> Result<(), IngestError<T>> {
        loop {
            // Register interest before checking capacity so a pop between the
            // check and the await is not missed.
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.offer(record)? {
                Offer::Enqueued | Offer::Dropped => return Ok(()),
                Offer::Full(returned) => {
                    record = returned;
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = self.cancel.cancelled() => {}
                    }
                }
            }
        }
    }

    /// Enqueue without waiting. A full queue under `block` reports overflow.
    pub fn try_push(&self, record: T) -> Result<(), IngestError<T>> {
        match self.offer(record)? {
            Offer::Enqueued | Offer::Dropped => Ok(()),
            Offer::Full(returned) => {
                self.stats.record_rejected();
                Err(IngestError::QueueOverflow(returned))
            }
        }
    }

    fn offer(&self, record: T) -> Result<Offer<T>, IngestError<T>> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Stopped(record));
        }

        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(_) => return Err(IngestError::Stopped(record)),
        };

        if inner.closed {
            return Err(IngestError::Stopped(record));
        }

        if let Some(limit) = self.buffer_limit {
            if inner.items.len() >= limit {
                match self.strategy {
                    BackpressureStrategy::Block => return Ok(Offer::Full(record)),
                    BackpressureStrategy::Reject => {
                        self.stats.record_rejected();
                        return Err(IngestError::QueueOverflow(record));
                    }
                    BackpressureStrategy::DropNewest => {
                        let dropped_total = self.stats.record_dropped();
                        warn!(dropped_total, "Dropping newest record due to queue full");
                        return Ok(Offer::Dropped);
                    }
                    BackpressureStrategy::DropOldest => {
                        inner.items.pop_front();
                        let dropped_total = self.stats.record_dropped();
                        warn!(dropped_total, "Dropping oldest record due to queue full");
                    }
                }
            }
        }

        inner.items.push_back(record);
        drop(inner);

        self.stats.record_ingested();
        self.readable.notify_one();
        Ok(Offer::Enqueued)
    }

    /// Wait for the next record.
    ///
    /// Returns `None` once the queue is closed and empty, or if the lock was
    /// poisoned. Cancel-safe: a record is only removed when returned.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.readable.notified();
            {
                let mut inner = self.inner.lock().ok()?;
                if let Some(record) = inner.items.pop_front() {
                    drop(inner);
                    self.writable.notify_one();
                    return Some(record);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Refuse further records. Already-queued records stay available to `pop`.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        // Wake blocked producers so they observe the closed queue
        self.writable.notify_waiters();
    }

    /// True once `close` ran or the cancellation token fired.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.inner.lock().map(|inner| inner.closed).unwrap_or(true)
    }

    /// True if no records are waiting. A poisoned lock reads as empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map(|inner| inner.items.is_empty()).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.items.len()).unwrap_or(0)
    }
}
