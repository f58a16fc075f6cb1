//! Mock clients and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::completion::CompletionClient;
use crate::core::PipelineState;
use crate::errors::CompletionError;
use crate::stages::Stage;
use crate::users::UserRecord;

/// One call seen by a [`ScriptedCompletionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The role that made the call.
    pub role: String,
    /// The system prompt sent.
    pub system_prompt: String,
    /// The payload sent.
    pub payload: serde_json::Value,
}

/// A completion client that answers from a script keyed by role.
///
/// Roles without a scripted answer receive `{}`, which every stage
/// normalizes to its schema defaults.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    responses: HashMap<String, serde_json::Value>,
    failures: HashMap<String, CompletionError>,
    fail_all: Option<CompletionError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompletionClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers calls from `role` with `response`.
    #[must_use]
    pub fn respond(mut self, role: impl Into<String>, response: serde_json::Value) -> Self {
        self.responses.insert(role.into(), response);
        self
    }

    /// Fails calls from `role` with `error`.
    #[must_use]
    pub fn fail(mut self, role: impl Into<String>, error: CompletionError) -> Self {
        self.failures.insert(role.into(), error);
        self
    }

    /// Fails every call with `error`.
    #[must_use]
    pub fn fail_all(mut self, error: CompletionError) -> Self {
        self.fail_all = Some(error);
        self
    }

    /// Sleeps before answering, to force interleaving between runs.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the roles called so far, in order.
    #[must_use]
    pub fn roles_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.role.clone()).collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(
        &self,
        role: &str,
        system_prompt: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CompletionError> {
        self.calls.lock().push(RecordedCall {
            role: role.to_string(),
            system_prompt: system_prompt.to_string(),
            payload: payload.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.get(role).or(self.fail_all.as_ref()) {
            return Err(err.clone());
        }
        Ok(self
            .responses
            .get(role)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }
}

/// A stage that panics while building its payload.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
    dependencies: Vec<String>,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Declares dependencies, so the stage passes builder validation.
    #[must_use]
    pub fn depends_on(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| (*d).to_string()).collect();
        self
    }
}

impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> &str {
        &self.name
    }

    fn system_prompt(&self) -> &str {
        ""
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    #[allow(clippy::panic)]
    fn payload(&self, _state: &PipelineState, _user: Option<&UserRecord>) -> serde_json::Value {
        panic!("stage '{}' blew up", self.name)
    }

    fn normalize(&self, raw: serde_json::Value) -> serde_json::Value {
        raw
    }

    fn fallback(&self, _state: &PipelineState) -> serde_json::Value {
        serde_json::json!({})
    }
}
