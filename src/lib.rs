//! Tumbling-window batching for log streams.
//!
//! A [`WindowedBatcher`] accepts records from any number of producers and
//! emits ordered, non-empty batches that close on whichever comes first:
//! `max_batch_size` records, or `max_window` elapsed since the last flush.

pub mod batcher;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use batcher::{Batch, BatcherStats, FlushTrigger, IngestError, IngestHandle, WindowedBatcher};
pub use config::{BackpressureStrategy, BatcherConfig};
