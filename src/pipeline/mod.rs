pub mod runner;

pub use runner::{run_pipeline, run_sink, PipelineError, PipelineSummary};
