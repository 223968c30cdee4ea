use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Matches `$env{NAME}` references
pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let (config, _) = load_config_with_yaml(path)?;
    Ok(config)
}

/// Load config and return both the parsed config and the expanded YAML string
pub fn load_config_with_yaml(path: &Path) -> Result<(Config, String), ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    Ok((config, expand_env_vars(&yaml_string)))
}

/// Parse and validate a config from YAML text
pub fn parse_config_str(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml_string)?;

    // An empty document means "all defaults"
    let mut config: Config = if yaml_string.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Expands tilde (~) in all PathBuf fields in the config.
fn expand_paths(config: &mut Config) {
    config.source.path = expand_tilde(&config.source.path);
    config.output.path = expand_tilde(&config.output.path);
}

/// Validate a fully assembled config, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_batcher(&config.batcher, &mut errors);

    if config.source.id.trim().is_empty() {
        errors.push("source.id cannot be empty".to_string());
    }

    if config.source.path.as_os_str().is_empty() {
        errors.push("source.path cannot be empty (use '-' for stdin)".to_string());
    }

    if config.output.path.as_os_str().is_empty() {
        errors.push("output.path cannot be empty (use '-' for stdout)".to_string());
    }

    if config.source.follow && config.source.is_stdin() {
        errors.push("source.follow requires a file path; stdin is always read until EOF".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_batcher(batcher: &BatcherConfig, errors: &mut Vec<String>) {
    if batcher.max_batch_size == 0 {
        errors.push("batcher.max_batch_size must be at least 1".to_string());
    }

    if batcher.max_window.is_zero() {
        errors.push("batcher.max_window must be greater than zero".to_string());
    }

    if batcher.idle_poll_interval.is_zero() {
        errors.push("batcher.idle_poll_interval must be greater than zero".to_string());
    }

    if batcher.backpressure.buffer_limit == Some(0) {
        errors.push(
            "batcher.backpressure.buffer_limit must be at least 1 (omit it for an unbounded queue)"
                .to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.batcher, BatcherConfig::default());
        assert_eq!(config.batcher.max_batch_size, 100);
        assert_eq!(config.batcher.max_window, Duration::from_secs(5));
        assert_eq!(config.batcher.idle_poll_interval, Duration::from_secs(1));
        assert!(config.source.is_stdin());
        assert!(config.output.is_stdout());
    }

    #[test]
    fn test_partial_batcher_section() {
        let config = parse_config_str(
            r#"
batcher:
  max_window: 500ms
  backpressure:
    strategy: drop_oldest
    buffer_limit: 64
"#,
        )
        .unwrap();

        assert_eq!(config.batcher.max_batch_size, 100);
        assert_eq!(config.batcher.max_window, Duration::from_millis(500));
        assert_eq!(config.batcher.backpressure.strategy, BackpressureStrategy::DropOldest);
        assert_eq!(config.batcher.backpressure.buffer_limit, Some(64));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let result = parse_config_str(
            r#"
batcher:
  max_batch_size: 0
  max_window: 0s
  backpressure:
    buffer_limit: 0
source:
  id: ""
"#,
        );

        match result {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 4);
                assert!(errors.iter().any(|e| e.contains("max_batch_size")));
                assert!(errors.iter().any(|e| e.contains("max_window")));
                assert!(errors.iter().any(|e| e.contains("buffer_limit")));
                assert!(errors.iter().any(|e| e.contains("source.id")));
            }
            other => panic!("expected validation list, got {:?}", other),
        }
    }

    #[test]
    fn test_follow_on_stdin_rejected() {
        let result = parse_config_str(
            r#"
source:
  follow: true
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationList(_))));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let result = parse_config_str(
            r#"
batcher:
  backpressure:
    strategy: shed_everything
"#,
        );
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn test_unexpanded_env_var_reported() {
        let result = parse_config_str(
            r#"
output:
  path: $env{LOGWINDOW_SURELY_UNSET_VAR}/batches.jsonl
"#,
        );

        match result {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains("LOGWINDOW_SURELY_UNSET_VAR"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
