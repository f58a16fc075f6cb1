//! Activity record type for the append-only stage log.

use super::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable entry describing something a stage did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique record ID.
    pub id: Uuid,

    /// The run that produced the record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    /// The stage (or agent) name.
    pub stage: String,

    /// Short action label (e.g., "completed", "degraded", "handoff").
    pub action: String,

    /// Free-text detail.
    #[serde(default)]
    pub detail: String,

    /// When the record was created.
    pub timestamp: DateTime<Utc>,

    /// Optional attached result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Whether the stage fell back to its default output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl ActivityRecord {
    /// Creates a new activity record.
    #[must_use]
    pub fn new(stage: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: None,
            stage: stage.into(),
            action: action.into(),
            detail: String::new(),
            timestamp: Utc::now(),
            result: None,
            degraded: false,
        }
    }

    /// Sets the run ID.
    #[must_use]
    pub fn for_run(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attaches a result payload.
    #[must_use]
    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Marks the record as describing a degraded stage.
    #[must_use]
    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// Creates a "completed" record.
    #[must_use]
    pub fn completed(run_id: RunId, stage: &str, result: serde_json::Value) -> Self {
        Self::new(stage, "completed")
            .for_run(run_id)
            .with_detail(format!("{stage} completed"))
            .with_result(result)
    }

    /// Creates a "degraded" record carrying the fallback payload.
    #[must_use]
    pub fn fell_back(run_id: RunId, stage: &str, cause: &str, fallback: serde_json::Value) -> Self {
        Self::new(stage, "degraded")
            .for_run(run_id)
            .with_detail(format!("{stage} used fallback output: {cause}"))
            .with_result(fallback)
            .degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = ActivityRecord::new("plan", "started");
        assert_eq!(record.stage, "plan");
        assert_eq!(record.action, "started");
        assert!(record.run_id.is_none());
        assert!(!record.degraded);
    }

    #[test]
    fn test_completed_record() {
        let run_id = RunId::new();
        let record = ActivityRecord::completed(run_id, "plan", serde_json::json!({"x": 1}));
        assert_eq!(record.run_id, Some(run_id));
        assert_eq!(record.action, "completed");
        assert_eq!(record.result, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_fell_back_record() {
        let record = ActivityRecord::fell_back(RunId::new(), "test", "timeout", serde_json::json!({}));
        assert!(record.degraded);
        assert!(record.detail.contains("timeout"));
    }

    #[test]
    fn test_serialization_skips_defaults() {
        let record = ActivityRecord::new("plan", "started");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("degraded").is_none());
        assert!(json.get("result").is_none());

        let back: ActivityRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
