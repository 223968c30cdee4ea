use crate::batcher::{Batch, FlushTrigger, WindowedBatcher};
use crate::config::types::BatcherConfig;
use crate::sink::{BatchSink, SinkError};
use crate::source::reader::{LineReader, LogLine, ReadSummary, ReaderError};
use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Errors that can occur during pipeline operation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("source reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Totals for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub batches: u64,
    pub records: u64,
    pub size_batches: u64,
    pub time_batches: u64,
    pub drain_batches: u64,
    pub largest_batch: usize,
    pub read: ReadSummary,
}

impl PipelineSummary {
    fn record<T>(&mut self, batch: &Batch<T>) {
        self.batches += 1;
        self.records += batch.len() as u64;
        self.largest_batch = self.largest_batch.max(batch.len());
        match batch.trigger {
            FlushTrigger::Size => self.size_batches += 1,
            FlushTrigger::Time => self.time_batches += 1,
            FlushTrigger::Drain => self.drain_batches += 1,
        }
    }
}

/// Run the sink task.
///
/// Writes every batch from the stream to the sink until the stream ends,
/// then flushes the sink.
pub async fn run_sink<T, B, S>(batches: B, sink: &mut S) -> Result<PipelineSummary, PipelineError>
where
    T: Serialize + Send + Sync,
    B: Stream<Item = Batch<T>>,
    S: BatchSink<T> + ?Sized,
{
    let mut summary = PipelineSummary::default();
    tokio::pin!(batches);

    info!("Batch sink started");

    while let Some(batch) = batches.next().await {
        sink.write_batch(&batch).await?;
        debug!(
            sequence_num = batch.sequence_num,
            size = batch.len(),
            trigger = %batch.trigger,
            "Wrote batch"
        );
        summary.record(&batch);
    }

    sink.flush().await?;

    info!(
        batches = summary.batches,
        records = summary.records,
        "Batch sink shutdown complete"
    );

    Ok(summary)
}

/// Wire a line reader through a windowed batcher into a sink.
///
/// Returns once the reader has stopped and every buffered record has been
/// written. Cancelling `cancel` stops the reader, which hands over any
/// partially read line and then stops the batcher.
pub async fn run_pipeline<S>(
    batcher_config: BatcherConfig,
    reader: LineReader,
    mut sink: S,
    cancel: CancellationToken,
) -> Result<PipelineSummary, PipelineError>
where
    S: BatchSink<LogLine>,
{
    // The reader owns the batcher's lifetime so its last line is not refused
    let batcher = WindowedBatcher::new(batcher_config);
    let handle = batcher.handle();
    let batches = batcher.produce_batches();

    info!(source_id = %reader.source_id(), "Starting source reader task");
    let reader_cancel = cancel.clone();
    let reader_handle = tokio::spawn(async move { reader.run(handle, reader_cancel).await });

    let sink_result = run_sink(batches, &mut sink).await;
    if let Err(e) = &sink_result {
        // Unblock the reader; nothing will consume its records any more
        error!(error = %e, "Sink failed, cancelling pipeline");
        cancel.cancel();
    }

    let read_result = reader_handle.await?;
    let mut summary = sink_result?;
    summary.read = read_result?;

    info!(
        lines_read = summary.read.lines_read,
        batches = summary.batches,
        records = summary.records,
        size_batches = summary.size_batches,
        time_batches = summary.time_batches,
        drain_batches = summary.drain_batches,
        "Pipeline complete"
    );

    Ok(summary)
}
