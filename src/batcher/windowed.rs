use crate::batcher::batch::Batch;
use crate::batcher::emitter::EmitLoop;
use crate::batcher::queue::{IngestError, IngestQueue};
use crate::batcher::stats::{BatcherStats, StatsCounters};
use crate::config::types::BatcherConfig;
use futures::stream::{self, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct Shared<T> {
    pub(crate) queue: IngestQueue<T>,
    pub(crate) stats: Arc<StatsCounters>,
    cancel: CancellationToken,
    handles: AtomicUsize,
}

impl<T> Shared<T> {
    fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stop requested, no further records will be accepted");
        }
        self.cancel.cancel();
        self.queue.close();
    }
}

/// Producer-side handle. Clone one into each producer task.
///
/// Dropping every handle without calling [`IngestHandle::stop`] closes the
/// queue, which the emit loop treats as an implicit stop.
pub struct IngestHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> IngestHandle<T> {
    /// Enqueue one record, waiting only under the `block` backpressure strategy.
    pub async fn ingest(&self, record: T) -> Result<(), IngestError<T>> {
        self.shared.queue.push(record).await
    }

    /// Enqueue one record without waiting.
    pub fn try_ingest(&self, record: T) -> Result<(), IngestError<T>> {
        self.shared.queue.try_push(record)
    }

    /// Signal that no further records will arrive. Idempotent; queued
    /// records are still delivered.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.queue.is_stopped()
    }

    pub fn stats(&self) -> BatcherStats {
        self.shared.stats.snapshot(self.shared.queue.len())
    }
}

impl<T> Clone for IngestHandle<T> {
    fn clone(&self) -> Self {
        self.shared.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for IngestHandle<T> {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("Last ingest handle dropped, closing queue");
            self.shared.queue.close();
        }
    }
}

/// Tumbling-window batcher with a dual size/time trigger.
///
/// Records go in through [`WindowedBatcher::ingest`] or any
/// [`IngestHandle`]; batches come out of [`WindowedBatcher::produce_batches`],
/// which consumes the batcher so only one emit loop can ever run.
pub struct WindowedBatcher<T> {
    config: BatcherConfig,
    handle: IngestHandle<T>,
}

impl<T> WindowedBatcher<T> {
    pub fn new(config: BatcherConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Build a batcher observing an external cancellation token. Cancelling
    /// the token has the same effect as [`WindowedBatcher::stop`].
    pub fn with_cancellation(config: BatcherConfig, cancel: CancellationToken) -> Self {
        let stats = Arc::new(StatsCounters::default());
        let queue = IngestQueue::new(
            config.backpressure.buffer_limit,
            config.backpressure.strategy,
            cancel.clone(),
            Arc::clone(&stats),
        );

        let shared = Arc::new(Shared {
            queue,
            stats,
            cancel,
            handles: AtomicUsize::new(1),
        });

        Self {
            config,
            handle: IngestHandle { shared },
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// A new producer handle sharing this batcher's queue
    pub fn handle(&self) -> IngestHandle<T> {
        self.handle.clone()
    }

    /// Token that fires when the batcher is stopped
    pub fn cancellation_token(&self) -> CancellationToken {
        self.handle.shared.cancel.clone()
    }

    pub async fn ingest(&self, record: T) -> Result<(), IngestError<T>> {
        self.handle.ingest(record).await
    }

    pub fn try_ingest(&self, record: T) -> Result<(), IngestError<T>> {
        self.handle.try_ingest(record)
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn stats(&self) -> BatcherStats {
        self.handle.stats()
    }
}

impl<T: Send + 'static> WindowedBatcher<T> {
    /// Start the emit loop and return its lazy batch stream.
    ///
    /// The stream ends only after a stop (explicit, token, or every handle
    /// dropped) has been observed and the queue has drained.
    pub fn produce_batches(self) -> impl Stream<Item = Batch<T>> + Send + 'static {
        let shared = Arc::clone(&self.handle.shared);
        let emit_loop = EmitLoop::new(&self.config, shared);
        // `self.handle` drops here; producers hold their own clones.
        drop(self);

        stream::unfold(emit_loop, |mut emit_loop| async move {
            let batch = emit_loop.next_batch().await?;
            Some((batch, emit_loop))
        })
    }
}
