//! Pipeline builder with validation.

use super::{GlobalFallback, RunContext, SequentialPipeline};
use crate::completion::CompletionClient;
use crate::core::{FinalResult, PipelineState};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::Stage;
use crate::synthesis::{NamespacedSynthesizer, Synthesizer};
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated sequential pipelines.
///
/// Stages run in the order they are added. A stage may only depend on
/// stages added before it, which rules out cycles by construction.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    names: HashSet<String>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    global_fallback: Option<Arc<GlobalFallback>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
            synthesizer: None,
            global_fallback: None,
        }
    }

    /// Appends a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage name is empty or already used, or if
    /// the stage depends on a stage that has not been added yet.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        let name = stage.name().to_string();

        if name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name cannot be empty")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-STAGE_NAME", "Empty stage name")
                        .with_fix_hint("Give every stage a non-empty, unique name."),
                ));
        }

        if self.names.contains(&name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{name}' is defined more than once"
            ))
            .with_stages(vec![name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE",
                    format!("Stage '{name}' already exists in pipeline '{}'", self.name),
                )
                .with_fix_hint("Stage names key the results; rename one of the stages."),
            ));
        }

        for dep in stage.dependencies() {
            if !self.names.contains(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{name}' depends on unknown stage '{dep}'"
                ))
                .with_stages(vec![name.clone(), dep.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-MISSING_DEP",
                        format!("Dependency '{dep}' not found"),
                    )
                    .with_fix_hint(
                        "Ensure the dependency is added before the stage that depends on it.",
                    )
                    .with_context_entry("stage", name.clone()),
                ));
            }
        }

        self.names.insert(name);
        self.stages.push(stage);
        Ok(self)
    }

    /// Uses a custom synthesizer; defaults to [`NamespacedSynthesizer`].
    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Sets the whole-pipeline fallback.
    ///
    /// The default copies whatever stage results exist into the result.
    #[must_use]
    pub fn with_global_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&PipelineState) -> FinalResult + Send + Sync + 'static,
    {
        self.global_fallback = Some(Arc::new(fallback));
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no name or no stages.
    pub fn build(
        self,
        client: Arc<dyn CompletionClient>,
        context: RunContext,
    ) -> Result<SequentialPipeline, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Pipeline name cannot be empty")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-NAME", "Empty pipeline name")
                        .with_fix_hint("Name the pipeline; the name labels every result."),
                ));
        }

        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        let name = self.name;
        let global_fallback = self.global_fallback.unwrap_or_else(|| {
            let pipeline = name.clone();
            Arc::new(move |state: &PipelineState| partial_result(&pipeline, state))
        });

        Ok(SequentialPipeline {
            name,
            stages: self.stages,
            client,
            context,
            synthesizer: self
                .synthesizer
                .unwrap_or_else(|| Arc::new(NamespacedSynthesizer::new())),
            global_fallback,
        })
    }
}

/// The default whole-pipeline fallback: the partial results as they stand.
#[must_use]
pub fn partial_result(pipeline: &str, state: &PipelineState) -> FinalResult {
    let mut result = FinalResult::new(state.run_id, pipeline);
    result.stage_results = state.stage_results().clone();
    result.summary = format!("{pipeline} pipeline could not complete; partial results returned");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::CompletionStage;
    use crate::testing::ScriptedCompletionClient;

    fn stage(name: &str, deps: &[&str]) -> Arc<dyn Stage> {
        Arc::new(CompletionStage::<serde_json::Value>::new(name, name, "").depends_on(deps))
    }

    fn client() -> Arc<dyn CompletionClient> {
        Arc::new(ScriptedCompletionClient::new())
    }

    #[test]
    fn test_builder_keeps_order() {
        let builder = PipelineBuilder::new("p")
            .stage(stage("a", &[]))
            .unwrap()
            .stage(stage("b", &["a"]))
            .unwrap()
            .stage(stage("c", &["a", "b"]))
            .unwrap();

        assert_eq!(builder.stage_names(), vec!["a", "b", "c"]);
        assert_eq!(builder.stage_count(), 3);

        let pipeline = builder.build(client(), RunContext::new()).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dependency_must_come_first() {
        let err = PipelineBuilder::new("p")
            .stage(stage("b", &["a"]))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-MISSING_DEP"));
        assert_eq!(err.stages, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = PipelineBuilder::new("p")
            .stage(stage("a", &[]))
            .unwrap()
            .stage(stage("a", &[]))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE"));
    }

    #[test]
    fn test_empty_stage_name_rejected() {
        let err = PipelineBuilder::new("p").stage(stage(" ", &[])).unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-STAGE_NAME"));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = PipelineBuilder::new("p")
            .build(client(), RunContext::new())
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));

        let err = PipelineBuilder::new("")
            .stage(stage("a", &[]))
            .unwrap()
            .build(client(), RunContext::new())
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-NAME"));
    }

    #[test]
    fn test_partial_result() {
        let mut state = PipelineState::new("x", "u");
        state.record("a", serde_json::json!({"k": 1}), false).unwrap();
        let result = partial_result("p", &state);
        assert_eq!(result.stage("a"), state.result("a"));
        assert!(result.summary.contains("partial"));
    }
}
