use crate::batcher::Batch;
use crate::sink::traits::{BatchSink, SinkError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Collects batches in memory. Clones share the same storage.
#[derive(Clone)]
pub struct MemorySink<T> {
    batches: Arc<Mutex<Vec<Batch<T>>>>,
}

impl<T: Clone> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn batches(&self) -> Vec<Batch<T>> {
        self.lock().clone()
    }

    // Recovers the guard from a poisoned lock
    fn lock(&self) -> MutexGuard<'_, Vec<Batch<T>>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> BatchSink<T> for MemorySink<T>
where
    T: Serialize + Clone + Send + Sync,
{
    async fn write_batch(&mut self, batch: &Batch<T>) -> Result<(), SinkError> {
        self.lock().push(batch.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
