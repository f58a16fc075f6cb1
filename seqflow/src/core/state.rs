//! Per-run pipeline state threaded through every stage.

use crate::contracts::tolerant_parse;
use crate::errors::OutputConflictError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Identifies one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The mutable object a run threads through its stages.
///
/// `stage_results` only grows: recording a second result for a stage is an
/// [`OutputConflictError`]. Degraded stages still record a schema-valid
/// fallback so downstream stages never see a missing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// The run this state belongs to.
    pub run_id: RunId,
    /// Original free-text request.
    pub input: String,
    /// Opaque caller identifier.
    pub user_id: String,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    stage_results: BTreeMap<String, serde_json::Value>,
    degraded: BTreeSet<String>,
    completed: Vec<String>,
}

impl PipelineState {
    /// Creates a fresh state for a new run.
    #[must_use]
    pub fn new(input: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            input: input.into(),
            user_id: user_id.into(),
            started_at: Utc::now(),
            stage_results: BTreeMap::new(),
            degraded: BTreeSet::new(),
            completed: Vec::new(),
        }
    }

    /// Uses a specific run ID.
    #[must_use]
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Merges a stage's result into the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage already has a result.
    pub fn record(
        &mut self,
        stage: &str,
        value: serde_json::Value,
        degraded: bool,
    ) -> Result<(), OutputConflictError> {
        if self.stage_results.contains_key(stage) {
            return Err(OutputConflictError::new(
                stage,
                "a result was already recorded for this run",
            ));
        }
        self.stage_results.insert(stage.to_string(), value);
        if degraded {
            self.degraded.insert(stage.to_string());
        }
        self.completed.push(stage.to_string());
        Ok(())
    }

    /// Returns the raw result for a stage.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<&serde_json::Value> {
        self.stage_results.get(stage)
    }

    /// Returns the result for a stage parsed into its typed schema.
    ///
    /// Parsing is tolerant: fields that do not fit the schema take their
    /// defaults.
    #[must_use]
    pub fn output<T>(&self, stage: &str) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        self.stage_results
            .get(stage)
            .map(|value| tolerant_parse::<T>(value.clone()))
    }

    /// Returns true if the stage has a recorded result.
    #[must_use]
    pub fn has_result(&self, stage: &str) -> bool {
        self.stage_results.contains_key(stage)
    }

    /// Returns all recorded results keyed by stage name.
    #[must_use]
    pub fn stage_results(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.stage_results
    }

    /// Returns the stages that used their fallback output.
    #[must_use]
    pub fn degraded(&self) -> &BTreeSet<String> {
        &self.degraded
    }

    /// Returns true if the stage used its fallback output.
    #[must_use]
    pub fn is_degraded(&self, stage: &str) -> bool {
        self.degraded.contains(stage)
    }

    /// Returns stage names in the order their results were recorded.
    #[must_use]
    pub fn completed(&self) -> &[String] {
        &self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Plan {
        #[serde(default)]
        technology: Vec<String>,
        #[serde(default)]
        summary: String,
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = PipelineState::new("deploy it", "user-1");
        assert_eq!(state.input, "deploy it");
        assert_eq!(state.user_id, "user-1");
        assert!(state.stage_results().is_empty());
        assert!(state.degraded().is_empty());
    }

    #[test]
    fn test_record_grows_results() {
        let mut state = PipelineState::new("x", "u");
        state.record("plan", serde_json::json!({"summary": "s"}), false).unwrap();
        state.record("build", serde_json::json!({}), true).unwrap();

        assert!(state.has_result("plan"));
        assert!(state.is_degraded("build"));
        assert!(!state.is_degraded("plan"));
        assert_eq!(state.completed(), ["plan".to_string(), "build".to_string()]);
    }

    #[test]
    fn test_record_conflict() {
        let mut state = PipelineState::new("x", "u");
        state.record("plan", serde_json::json!({}), false).unwrap();
        let err = state.record("plan", serde_json::json!({"again": true}), false).unwrap_err();

        assert_eq!(err.stage, "plan");
        assert_eq!(state.result("plan"), Some(&serde_json::json!({})));
    }

    #[test]
    fn test_typed_output_fills_defaults() {
        let mut state = PipelineState::new("x", "u");
        state
            .record("plan", serde_json::json!({"technology": ["node"], "summary": 7}), false)
            .unwrap();

        let plan: Plan = state.output("plan").unwrap();
        assert_eq!(plan.technology, vec!["node".to_string()]);
        assert_eq!(plan.summary, "");
        assert!(state.output::<Plan>("missing").is_none());
    }

    #[test]
    fn test_run_id_display_matches_uuid() {
        let id = Uuid::new_v4();
        let run_id = RunId::from_uuid(id);
        assert_eq!(run_id.to_string(), id.to_string());
        assert_eq!(serde_json::to_value(run_id).unwrap(), serde_json::json!(id.to_string()));
    }
}
