use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path value meaning stdin (for sources) or stdout (for outputs)
pub const STDIO_PATH: &str = "-";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub batcher: BatcherConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatcherConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_window", with = "duration_format")]
    pub max_window: Duration,
    #[serde(default = "default_idle_poll_interval", with = "duration_format")]
    pub idle_poll_interval: Duration,
    #[serde(default)]
    pub backpressure: BackpressureConfig,
}

fn default_max_batch_size() -> usize {
    100
}

fn default_max_window() -> Duration {
    Duration::from_secs(5)
}

fn default_idle_poll_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_window: default_max_window(),
            idle_poll_interval: default_idle_poll_interval(),
            backpressure: BackpressureConfig::default(),
        }
    }
}

impl BatcherConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_max_window(mut self, max_window: Duration) -> Self {
        self.max_window = max_window;
        self
    }

    pub fn with_idle_poll_interval(mut self, idle_poll_interval: Duration) -> Self {
        self.idle_poll_interval = idle_poll_interval;
        self
    }

    pub fn with_backpressure(mut self, strategy: BackpressureStrategy, buffer_limit: Option<usize>) -> Self {
        self.backpressure = BackpressureConfig {
            strategy,
            buffer_limit,
        };
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    #[serde(default)]
    pub strategy: BackpressureStrategy,
    /// Queue capacity; absent means unbounded
    #[serde(default)]
    pub buffer_limit: Option<usize>,
}

/// What `ingest` does when the queue is at `buffer_limit`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureStrategy {
    /// Producer waits for free space
    #[default]
    Block,
    /// Producer gets `QueueOverflow`
    Reject,
    /// Incoming record is discarded
    DropNewest,
    /// Front of the queue is evicted to make room
    DropOldest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_id")]
    pub id: String,
    #[serde(default = "default_stdio_path")]
    pub path: PathBuf,
    /// Keep reading after EOF until stopped
    #[serde(default)]
    pub follow: bool,
    #[serde(default = "default_skip_empty_lines")]
    pub skip_empty_lines: bool,
}

fn default_source_id() -> String {
    "stdin".to_string()
}

fn default_stdio_path() -> PathBuf {
    PathBuf::from(STDIO_PATH)
}

fn default_skip_empty_lines() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id: default_source_id(),
            path: default_stdio_path(),
            follow: false,
            skip_empty_lines: default_skip_empty_lines(),
        }
    }
}

impl SourceConfig {
    pub fn is_stdin(&self) -> bool {
        is_stdio(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_stdio_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_stdio_path(),
        }
    }
}

impl OutputConfig {
    pub fn is_stdout(&self) -> bool {
        is_stdio(&self.path)
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

// Custom serde module for duration parsing
pub mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse `500ms`, `5s`, `2m` or `1h`
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(value) = s.strip_suffix("ms") {
            (value, "ms")
        } else if let Some(value) = s.strip_suffix('s') {
            (value, "s")
        } else if let Some(value) = s.strip_suffix('m') {
            (value, "m")
        } else if let Some(value) = s.strip_suffix('h') {
            (value, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(scale(value, 60, s)?),
            "h" => Duration::from_secs(scale(value, 3600, s)?),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    fn scale(value: u64, secs_per_unit: u64, s: &str) -> Result<u64, String> {
        value
            .checked_mul(secs_per_unit)
            .ok_or_else(|| format!("duration too large: {}", s))
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_nanos() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

}
