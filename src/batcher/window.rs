use crate::batcher::batch::{Batch, FlushTrigger};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Tumbling window over an ordered record buffer.
///
/// Owned exclusively by the emit loop; holds no locks. Callers pass the
/// current instant so the trigger logic can be driven deterministically.
///
/// The window runs from the last flush, not from the first buffered record,
/// and idle time does not reset it. After an idle gap longer than
/// `max_window`, the first record to arrive is already expired and is flushed
/// on its own as a `time` batch; records right behind it start a new window.
pub struct WindowState<T> {
    max_batch_size: usize,
    max_window: Duration,
    buffer: Vec<T>,
    last_flush: Instant,
    opened_at: DateTime<Utc>,
    sequence_counter: u64,
}

impl<T> WindowState<T> {
    pub fn new(max_batch_size: usize, max_window: Duration, now: Instant) -> Self {
        Self {
            max_batch_size,
            max_window,
            buffer: Vec::with_capacity(max_batch_size),
            last_flush: now,
            opened_at: Utc::now(),
            sequence_counter: 0,
        }
    }

    /// Append a record to the window.
    /// Returns a completed batch if the size limit was reached.
    pub fn push(&mut self, record: T, now: Instant) -> Option<Batch<T>> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_batch_size {
            self.flush(FlushTrigger::Size, now)
        } else {
            None
        }
    }

    /// Time left before the current window expires, zero once expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.max_window
            .saturating_sub(now.saturating_duration_since(self.last_flush))
    }

    /// True when the window has expired and holds at least one record.
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.buffer.is_empty() && now.saturating_duration_since(self.last_flush) >= self.max_window
    }

    /// Close the current window, resetting `last_flush` to `now`.
    /// An empty buffer never produces a batch.
    pub fn flush(&mut self, trigger: FlushTrigger, now: Instant) -> Option<Batch<T>> {
        if self.buffer.is_empty() {
            return None;
        }

        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_batch_size));
        let closed_at = Utc::now();

        let batch = Batch {
            batch_id: Uuid::new_v4(),
            sequence_num: self.sequence_counter,
            trigger,
            opened_at: self.opened_at,
            closed_at,
            records,
        };

        self.sequence_counter += 1;
        self.last_flush = now;
        self.opened_at = closed_at;

        Some(batch)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of batches emitted so far
    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }
}
