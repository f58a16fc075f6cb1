//! Error types for the seqflow pipeline.
//!
//! Completion failures are absorbed at the stage, runner faults at the top of
//! `execute`. Everything else (validation, configuration, handoff) is
//! surfaced to the caller through [`SeqflowError`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for seqflow operations.
#[derive(Debug, Error)]
pub enum SeqflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A completion call failed.
    #[error("{0}")]
    Completion(#[from] CompletionError),

    /// The runner's own control flow failed.
    #[error("{0}")]
    Runner(#[from] RunnerFault),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The handoff bus rejected a message.
    #[error("{0}")]
    Handoff(#[from] HandoffError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-MISSING_DEP").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }

        map
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// A completion call against the language-model provider failed.
///
/// Never retried by the client; the calling stage decides what to do.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The provider answered with a non-2xx status.
    #[error("Completion provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The request did not complete in time.
    #[error("Completion request timed out")]
    Timeout,

    /// The request could not be sent or the response could not be read.
    #[error("Completion transport error: {0}")]
    Transport(String),

    /// The response carried no message content.
    #[error("Completion response had no content")]
    EmptyResponse,

    /// The message content was not valid JSON.
    #[error("Completion content is not valid JSON: {0}")]
    Parse(String),

    /// The client was not configured to make calls.
    #[error("Completion client unavailable: {0}")]
    Unavailable(String),
}

impl CompletionError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(cause: impl Into<String>) -> Self {
        Self::Transport(cause.into())
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(cause: impl Into<String>) -> Self {
        Self::Parse(cause.into())
    }

    /// Short machine-readable kind, used in activity records and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::EmptyResponse => "empty_response",
            Self::Parse(_) => "parse",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// An unexpected failure inside the runner's own control flow.
#[derive(Debug, Clone, Error)]
pub enum RunnerFault {
    /// A stage result was written twice.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// A stage ran before one of its dependencies produced a result.
    #[error("Stage '{stage}' is missing upstream result '{dependency}'")]
    MissingDependency {
        /// The stage that was about to run.
        stage: String,
        /// The dependency that had no entry.
        dependency: String,
    },

    /// A stage or the synthesizer panicked.
    #[error("Stage '{stage}' panicked: {message}")]
    Panicked {
        /// The stage (or "synthesizer").
        stage: String,
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl RunnerFault {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        let kind = match self {
            Self::OutputConflict(_) => "OutputConflict",
            Self::MissingDependency { .. } => "MissingDependency",
            Self::Panicked { .. } => "Panicked",
        };
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised when a stage result is recorded twice.
#[derive(Debug, Clone, Error)]
#[error("Output conflict for stage '{stage}': {message}")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
    /// Additional message.
    pub message: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Configuration could not be loaded or is incomplete.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required value was not provided.
    #[error("Missing configuration value: {0}")]
    Missing(String),

    /// A value was present but could not be interpreted.
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid {
        /// The configuration key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A log sink could not accept an entry.
#[derive(Debug, Clone, Error)]
#[error("Log sink '{sink}' failed: {reason}")]
pub struct SinkError {
    /// The sink name.
    pub sink: String,
    /// Why the append failed.
    pub reason: String,
}

impl SinkError {
    /// Creates a new sink error.
    #[must_use]
    pub fn new(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by the handoff bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// The bounded queue is full.
    #[error("Handoff queue is full (capacity {capacity})")]
    Full {
        /// The configured capacity.
        capacity: usize,
    },

    /// The bus has been shut down.
    #[error("Handoff bus is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "plan");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"plan".to_string()));

        let dict = info.to_dict();
        assert_eq!(dict["code"], "TEST-001");
        assert_eq!(dict["context"]["stage"], "plan");
    }

    #[test]
    fn test_validation_error_code() {
        let err = PipelineValidationError::new("bad")
            .with_error_info(ContractErrorInfo::new("CONTRACT-004-EMPTY", "empty"));
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));
        assert_eq!(PipelineValidationError::new("bad").code(), None);
    }

    #[test]
    fn test_completion_error_kinds() {
        assert_eq!(CompletionError::Timeout.kind(), "timeout");
        assert_eq!(CompletionError::parse("eof").kind(), "parse");
        let status = CompletionError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert!(status.to_string().contains("503"));
    }

    #[test]
    fn test_runner_fault_to_dict() {
        let fault = RunnerFault::from(OutputConflictError::new("plan", "already recorded"));
        let dict = fault.to_dict();
        assert_eq!(dict["type"], "OutputConflict");
        assert!(dict["message"].as_str().unwrap_or_default().contains("plan"));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: SeqflowError = HandoffError::Closed.into();
        assert!(matches!(err, SeqflowError::Handoff(HandoffError::Closed)));
    }
}
