pub mod batch;
mod emitter;
pub mod queue;
pub mod stats;
pub mod window;
pub mod windowed;

pub use batch::{Batch, FlushTrigger};
pub use queue::IngestError;
pub use stats::BatcherStats;
pub use windowed::{IngestHandle, WindowedBatcher};
