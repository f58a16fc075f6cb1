//! The caller-visible result of a pipeline run.

use super::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything a run produced, namespaced by stage name.
///
/// Every stage's contribution is present, including degraded ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    /// The run that produced this result.
    pub run_id: RunId,
    /// Name of the pipeline (e.g., "career", "devops").
    pub pipeline: String,
    /// Stage outputs keyed by stage name.
    pub stage_results: BTreeMap<String, serde_json::Value>,
    /// Stages that used their fallback output.
    #[serde(default)]
    pub degraded: BTreeSet<String>,
    /// True when the whole-pipeline fallback replaced the synthesis.
    #[serde(default)]
    pub fallback: bool,
    /// Short human-readable summary.
    #[serde(default)]
    pub summary: String,
    /// When the result was produced.
    pub generated_at: DateTime<Utc>,
}

impl FinalResult {
    /// Creates an empty result for a run, stamped now.
    #[must_use]
    pub fn new(run_id: RunId, pipeline: impl Into<String>) -> Self {
        Self::at(run_id, pipeline, Utc::now())
    }

    /// Creates an empty result for a run with a fixed timestamp.
    #[must_use]
    pub fn at(run_id: RunId, pipeline: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            stage_results: BTreeMap::new(),
            degraded: BTreeSet::new(),
            fallback: false,
            summary: String::new(),
            generated_at,
        }
    }

    /// Returns the output for a stage.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&serde_json::Value> {
        self.stage_results.get(name)
    }

    /// Returns true if no stage degraded and no global fallback was used.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.fallback && self.degraded.is_empty()
    }
}
