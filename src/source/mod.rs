pub mod reader;

pub use reader::{LineReader, LogLine, ReadSummary, ReaderError};
