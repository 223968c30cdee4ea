use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a batch was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushTrigger {
    /// Buffer reached `max_batch_size`
    Size,
    /// `max_window` elapsed since the last flush
    Time,
    /// Final partial batch emitted after stop
    Drain,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Size => write!(f, "size"),
            FlushTrigger::Time => write!(f, "time"),
            FlushTrigger::Drain => write!(f, "drain"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch<T> {
    /// Unique batch ID (for deduplication downstream)
    pub batch_id: Uuid,

    /// Monotonic sequence number for this batcher
    /// Starts at 0, increments by 1 per emitted batch
    pub sequence_num: u64,

    /// Condition that closed this batch
    pub trigger: FlushTrigger,

    /// Wall-clock start of the window this batch covers
    pub opened_at: DateTime<Utc>,

    /// Wall-clock instant the batch was emitted
    pub closed_at: DateTime<Utc>,

    /// Records in arrival order, never empty
    pub records: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}
