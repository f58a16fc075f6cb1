//! Top-level configuration.
//!
//! Values come from defaults, then an optional JSON file, then environment
//! variables, each layer overriding the previous one.

use crate::completion::CompletionConfig;
use crate::errors::{ConfigError, SeqflowError};
use crate::handoff::HandoffConfig;
use crate::observability::LogFormat;
use crate::tracking::{ActivityLogConfig, DEFAULT_RUN_RETENTION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable for the log format ("text" or "json").
pub const ENV_LOG_FORMAT: &str = "SEQFLOW_LOG_FORMAT";
/// Environment variable bounding the activity log.
pub const ENV_ACTIVITY_CAPACITY: &str = "SEQFLOW_ACTIVITY_CAPACITY";
/// Environment variable for the handoff queue size.
pub const ENV_HANDOFF_CAPACITY: &str = "SEQFLOW_HANDOFF_CAPACITY";
/// Environment variable for the number of runs the status tracker keeps.
pub const ENV_STATUS_RETENTION: &str = "SEQFLOW_STATUS_RETENTION";

/// Configuration for a seqflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqflowConfig {
    /// Completion client settings.
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Activity log settings.
    #[serde(default)]
    pub activity: ActivityLogConfig,
    /// Handoff bus settings.
    #[serde(default)]
    pub handoff: HandoffConfig,
    /// Number of runs the status tracker keeps before forgetting the oldest.
    #[serde(default = "default_status_retention")]
    pub status_retention: usize,
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_status_retention() -> usize {
    DEFAULT_RUN_RETENTION
}

impl Default for SeqflowConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            activity: ActivityLogConfig::default(),
            handoff: HandoffConfig::default(),
            status_retention: default_status_retention(),
            log_format: LogFormat::default(),
        }
    }
}

impl SeqflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a JSON file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SeqflowError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads defaults, the optional file, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, SeqflowError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup (usually the environment).
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.completion.apply_env(&lookup)?;

        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            self.log_format = raw
                .parse()
                .map_err(|reason: String| ConfigError::invalid(ENV_LOG_FORMAT, reason))?;
        }
        if let Some(raw) = lookup(ENV_ACTIVITY_CAPACITY) {
            self.activity = self
                .activity
                .clone()
                .with_capacity(parse_positive(ENV_ACTIVITY_CAPACITY, &raw)?);
        }
        if let Some(raw) = lookup(ENV_HANDOFF_CAPACITY) {
            self.handoff.capacity = parse_positive(ENV_HANDOFF_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STATUS_RETENTION) {
            self.status_retention = parse_positive(ENV_STATUS_RETENTION, &raw)?;
        }
        Ok(())
    }

    /// Sets the completion settings.
    #[must_use]
    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Sets the activity log settings.
    #[must_use]
    pub fn with_activity(mut self, activity: ActivityLogConfig) -> Self {
        self.activity = activity;
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(key, "must be positive")),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::invalid(key, format!("'{raw}' is not a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ENV_API_KEY, ENV_MODEL};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SeqflowConfig::new();
        assert_eq!(config.activity.capacity, None);
        assert_eq!(config.handoff.capacity, 64);
        assert_eq!(config.status_retention, DEFAULT_RUN_RETENTION);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"completion": {{"model": "gpt-4o-mini"}}, "activity": {{"capacity": 100}}, "log_format": "json"}}"#
        )
        .unwrap();

        let config = SeqflowConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.activity.capacity, Some(100));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.handoff, HandoffConfig::default());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeqflowConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SeqflowError::Io(_)));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = SeqflowConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, SeqflowError::Serialization(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SeqflowConfig::new();
        config
            .apply_env(lookup(&[
                (ENV_API_KEY, "sk-test"),
                (ENV_MODEL, "gpt-4.1"),
                (ENV_LOG_FORMAT, "json"),
                (ENV_ACTIVITY_CAPACITY, "500"),
                (ENV_HANDOFF_CAPACITY, "8"),
                (ENV_STATUS_RETENTION, "32"),
            ]))
            .unwrap();

        assert_eq!(config.completion.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.completion.model, "gpt-4.1");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.activity.capacity, Some(500));
        assert_eq!(config.handoff.capacity, 8);
        assert_eq!(config.status_retention, 32);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = SeqflowConfig::new();
        let err = config
            .apply_env(lookup(&[(ENV_HANDOFF_CAPACITY, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_HANDOFF_CAPACITY));

        let err = config
            .apply_env(lookup(&[(ENV_LOG_FORMAT, "xml")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }
}
