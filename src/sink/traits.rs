use crate::batcher::Batch;
use async_trait::async_trait;
use serde::Serialize;

/// Destination for emitted batches.
#[async_trait]
pub trait BatchSink<T>: Send
where
    T: Serialize + Send + Sync,
{
    async fn write_batch(&mut self, batch: &Batch<T>) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
