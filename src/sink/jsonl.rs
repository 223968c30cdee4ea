use crate::batcher::{Batch, FlushTrigger};
use crate::config::types::OutputConfig;
use crate::sink::traits::{BatchSink, SinkError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use uuid::Uuid;

/// Wire shape of one output line. `size` lets a downstream consumer compute
/// its noise-reduction ratio without counting records.
#[derive(Serialize)]
struct BatchLine<'a, T> {
    batch_id: Uuid,
    sequence_num: u64,
    trigger: FlushTrigger,
    size: usize,
    opened_at: DateTime<Utc>,
    closed_at: DateTime<Utc>,
    records: &'a [T],
}

/// Writes each batch as a single JSON object followed by a newline.
pub struct JsonLinesSink {
    writer: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: BufWriter::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    /// Open `path` for appending, creating it if needed
    pub async fn append_to(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self::new(file))
    }

    pub async fn from_config(config: &OutputConfig) -> Result<Self, SinkError> {
        if config.is_stdout() {
            Ok(Self::stdout())
        } else {
            Self::append_to(&config.path).await
        }
    }
}

#[async_trait]
impl<T> BatchSink<T> for JsonLinesSink
where
    T: Serialize + Send + Sync,
{
    async fn write_batch(&mut self, batch: &Batch<T>) -> Result<(), SinkError> {
        let line = BatchLine {
            batch_id: batch.batch_id,
            sequence_num: batch.sequence_num,
            trigger: batch.trigger,
            size: batch.len(),
            opened_at: batch.opened_at,
            closed_at: batch.closed_at,
            records: &batch.records,
        };

        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        // One batch per line; make each visible as soon as it is written
        self.writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}
