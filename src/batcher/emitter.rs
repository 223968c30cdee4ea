use crate::batcher::batch::{Batch, FlushTrigger};
use crate::batcher::window::WindowState;
use crate::batcher::windowed::Shared;
use crate::config::types::BatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

/// Single sequential consumer of the ingest queue.
///
/// Each call to [`EmitLoop::next_batch`] runs emission cycles until one
/// produces a batch or the stream is finished.
pub(crate) struct EmitLoop<T> {
    shared: Arc<Shared<T>>,
    window: WindowState<T>,
    idle_poll_interval: Duration,
    finished: bool,
}

impl<T> EmitLoop<T> {
    pub(crate) fn new(config: &BatcherConfig, shared: Arc<Shared<T>>) -> Self {
        info!(
            max_batch_size = config.max_batch_size,
            max_window_ms = config.max_window.as_millis() as u64,
            "Batch emitter started"
        );

        Self {
            shared,
            window: WindowState::new(config.max_batch_size, config.max_window, Instant::now()),
            idle_poll_interval: config.idle_poll_interval,
            finished: false,
        }
    }

    /// Next batch, or `None` once stop has been observed and everything drained.
    pub(crate) async fn next_batch(&mut self) -> Option<Batch<T>> {
        if self.finished {
            return None;
        }

        loop {
            let queue = &self.shared.queue;

            // Stop takes effect here, at the top of a cycle, once nothing is
            // left to read.
            if queue.is_stopped() && queue.is_empty() {
                self.finished = true;
                let residual = self.window.flush(FlushTrigger::Drain, Instant::now());
                info!(
                    batches = self.window.sequence_counter(),
                    final_batch = residual.as_ref().map(|b| b.len()).unwrap_or(0),
                    "Stop observed, queue drained"
                );
                return residual.map(|batch| self.emitted(batch));
            }

            if self.window.is_empty() {
                // Nothing buffered: the timeout only exists to re-check stop.
                match timeout(self.idle_poll_interval, queue.pop()).await {
                    Ok(Some(record)) => {
                        if let Some(batch) = self.window.push(record, Instant::now()) {
                            return Some(self.emitted(batch));
                        }
                    }
                    // Closed and empty, handled at the top of the loop
                    Ok(None) => continue,
                    Err(_) => continue,
                }
            } else {
                let remaining = self.window.remaining(Instant::now());
                match timeout(remaining, queue.pop()).await {
                    Ok(Some(record)) => {
                        if let Some(batch) = self.window.push(record, Instant::now()) {
                            return Some(self.emitted(batch));
                        }
                    }
                    Ok(None) => continue,
                    Err(_) => {
                        if let Some(batch) = self.window.flush(FlushTrigger::Time, Instant::now()) {
                            return Some(self.emitted(batch));
                        }
                        continue;
                    }
                }
            }

            // An append can land after the deadline when the wait overran it.
            let now = Instant::now();
            if self.window.is_expired(now) {
                if let Some(batch) = self.window.flush(FlushTrigger::Time, now) {
                    return Some(self.emitted(batch));
                }
            }
        }
    }

    fn emitted(&self, batch: Batch<T>) -> Batch<T> {
        debug!(
            sequence_num = batch.sequence_num,
            size = batch.len(),
            trigger = %batch.trigger,
            "Emitting batch"
        );
        self.shared.stats.record_batch(batch.trigger, batch.len());
        batch
    }
}
