//! Stage trait and the completion-backed stage implementation.
//!
//! A stage describes one LLM role in a pipeline: what it reads from the run
//! state, what it asks the model, how to coerce the answer into its schema,
//! and what to use when the model call fails. The execution algorithm itself
//! lives in [`crate::pipeline`] and is shared by every stage.

use crate::contracts::normalize;
use crate::core::PipelineState;
use crate::users::UserRecord;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Trait for pipeline stages.
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage (also its key in the results).
    fn name(&self) -> &str;

    /// Returns the agent role passed to the completion client.
    fn role(&self) -> &str;

    /// Returns the stage-specific system prompt.
    fn system_prompt(&self) -> &str;

    /// Returns the names of stages whose results this stage reads.
    fn dependencies(&self) -> &[String];

    /// Builds the completion payload from upstream results.
    fn payload(&self, state: &PipelineState, user: Option<&UserRecord>) -> serde_json::Value;

    /// Coerces a raw model answer into the stage schema. Never fails.
    fn normalize(&self, raw: serde_json::Value) -> serde_json::Value;

    /// Returns the schema-valid output used when the completion call fails.
    fn fallback(&self, state: &PipelineState) -> serde_json::Value;
}

type PayloadFn = dyn Fn(&PipelineState, Option<&UserRecord>) -> serde_json::Value + Send + Sync;
type FallbackFn<T> = dyn Fn(&PipelineState) -> T + Send + Sync;

/// Builds the default payload: the request, the user's preferences and the
/// results of every declared dependency.
#[must_use]
pub fn upstream_payload(
    state: &PipelineState,
    dependencies: &[String],
    user: Option<&UserRecord>,
) -> serde_json::Value {
    let upstream: serde_json::Map<String, serde_json::Value> = dependencies
        .iter()
        .filter_map(|dep| state.result(dep).map(|value| (dep.clone(), value.clone())))
        .collect();

    let mut payload = serde_json::json!({
        "input": state.input,
        "upstream": upstream,
    });
    if let Some(user) = user {
        payload["preferences"] = serde_json::json!(user.preferences);
    }
    payload
}

/// A stage whose output schema is `T`.
///
/// Model answers are normalized through `T` so that every field exists;
/// the fallback is a `T` as well, so degraded output has the same shape.
pub struct CompletionStage<T> {
    name: String,
    role: String,
    system_prompt: String,
    dependencies: Vec<String>,
    payload_fn: Option<Arc<PayloadFn>>,
    fallback_fn: Option<Arc<FallbackFn<T>>>,
    _schema: PhantomData<fn() -> T>,
}

impl<T> CompletionStage<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    /// Creates a new stage.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            system_prompt: system_prompt.into(),
            dependencies: Vec::new(),
            payload_fn: None,
            fallback_fn: None,
            _schema: PhantomData,
        }
    }

    /// Declares the stages whose results this stage reads.
    #[must_use]
    pub fn depends_on(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| (*d).to_string()).collect();
        self
    }

    /// Replaces the default payload builder.
    #[must_use]
    pub fn with_payload<F>(mut self, payload: F) -> Self
    where
        F: Fn(&PipelineState, Option<&UserRecord>) -> serde_json::Value + Send + Sync + 'static,
    {
        self.payload_fn = Some(Arc::new(payload));
        self
    }

    /// Sets the fallback output; defaults to `T::default()`.
    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&PipelineState) -> T + Send + Sync + 'static,
    {
        self.fallback_fn = Some(Arc::new(fallback));
        self
    }
}

impl<T> Debug for CompletionStage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStage")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("dependencies", &self.dependencies)
            .field("schema", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Stage for CompletionStage<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn payload(&self, state: &PipelineState, user: Option<&UserRecord>) -> serde_json::Value {
        match &self.payload_fn {
            Some(build) => build(state, user),
            None => upstream_payload(state, &self.dependencies, user),
        }
    }

    fn normalize(&self, raw: serde_json::Value) -> serde_json::Value {
        normalize::<T>(raw)
    }

    fn fallback(&self, state: &PipelineState) -> serde_json::Value {
        let value = self
            .fallback_fn
            .as_ref()
            .map_or_else(T::default, |fallback| fallback(state));
        serde_json::to_value(value).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Report {
        passed: bool,
        checks: Vec<String>,
    }

    fn stage() -> CompletionStage<Report> {
        CompletionStage::<Report>::new("test", "tester", "Run the checks.").depends_on(&["build"])
    }

    #[test]
    fn test_stage_metadata() {
        let stage = stage();
        assert_eq!(stage.name(), "test");
        assert_eq!(stage.role(), "tester");
        assert_eq!(stage.dependencies(), ["build".to_string()]);
        assert!(format!("{stage:?}").contains("Report"));
    }

    #[test]
    fn test_default_payload_includes_upstream() {
        let mut state = PipelineState::new("ship it", "u");
        state.record("build", serde_json::json!({"artifact": "app.tar"}), false).unwrap();
        state.record("other", serde_json::json!({"x": 1}), false).unwrap();
        let user = UserRecord::new("u").with_preference("cloud", serde_json::json!("aws"));

        let payload = stage().payload(&state, Some(&user));
        assert_eq!(payload["input"], "ship it");
        assert_eq!(payload["upstream"]["build"]["artifact"], "app.tar");
        assert!(payload["upstream"].get("other").is_none());
        assert_eq!(payload["preferences"]["cloud"], "aws");
    }

    #[test]
    fn test_normalize_and_fallback() {
        let stage = stage().with_fallback(|_| Report {
            passed: false,
            checks: vec!["manual review".to_string()],
        });

        let normalized = stage.normalize(serde_json::json!({"passed": "yes"}));
        assert_eq!(normalized, serde_json::json!({"passed": false, "checks": []}));

        let state = PipelineState::new("x", "u");
        assert_eq!(stage.fallback(&state)["checks"][0], "manual review");
    }

    #[test]
    fn test_custom_payload() {
        let stage = stage().with_payload(|state, _| serde_json::json!({"text": state.input}));
        let state = PipelineState::new("hello", "u");
        assert_eq!(stage.payload(&state, None), serde_json::json!({"text": "hello"}));
    }
}
