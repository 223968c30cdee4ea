pub mod jsonl;
pub mod memory;
pub mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use traits::{BatchSink, SinkError};
