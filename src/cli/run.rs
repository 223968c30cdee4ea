use crate::config::parse::{load_config, validate_config, ConfigError};
use crate::config::types::Config;
use crate::pipeline::{run_pipeline, PipelineError, PipelineSummary};
use crate::sink::{JsonLinesSink, SinkError};
use crate::source::LineReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub source_id: Option<String>,
    pub follow: bool,
    pub max_batch_size: Option<usize>,
    pub max_window: Option<Duration>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: RunOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(config_path.as_deref(), overrides)?;
    run_with_config(config).await?;
    Ok(())
}

/// Load the config file (or defaults when none was found) and apply overrides.
pub fn build_config(config_path: Option<&Path>, overrides: RunOverrides) -> Result<Config, RunError> {
    let mut config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    if let Some(input) = overrides.input {
        config.source.path = crate::config::expand_tilde(&input);
    }
    if let Some(output) = overrides.output {
        config.output.path = crate::config::expand_tilde(&output);
    }
    if let Some(source_id) = overrides.source_id {
        config.source.id = source_id;
    }
    if overrides.follow {
        config.source.follow = true;
    }
    if let Some(max_batch_size) = overrides.max_batch_size {
        config.batcher.max_batch_size = max_batch_size;
    }
    if let Some(max_window) = overrides.max_window {
        config.batcher.max_window = max_window;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Run until the source is exhausted or Ctrl+C, then drain and return.
pub async fn run_with_config(config: Config) -> Result<PipelineSummary, RunError> {
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    let signal_handle = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, draining buffered records");
            signal_cancel.cancel();
        }
    });

    let sink = JsonLinesSink::from_config(&config.output).await?;
    let reader = LineReader::new(&config.source);

    info!(
        max_batch_size = config.batcher.max_batch_size,
        max_window_ms = config.batcher.max_window.as_millis() as u64,
        strategy = ?config.batcher.backpressure.strategy,
        "Pipeline started, press Ctrl+C to shutdown"
    );

    let result = run_pipeline(config.batcher.clone(), reader, sink, cancel).await;
    signal_handle.abort();

    let summary = result?;
    info!("Pipeline shutdown complete");
    Ok(summary)
}
