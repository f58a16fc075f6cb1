//! Sequential execution of pipeline stages.

use super::{GlobalFallback, RunContext};
use crate::completion::CompletionClient;
use crate::core::{ActivityRecord, FinalResult, PipelineState, StageStatus};
use crate::errors::{OutputConflictError, RunnerFault};
use crate::handoff::AgentMessage;
use crate::stages::Stage;
use crate::synthesis::Synthesizer;
use crate::users::UserRecord;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// The outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// The final (or last-known-good) state.
    pub state: PipelineState,
    /// The caller-visible result.
    pub result: FinalResult,
}

/// A fixed, ordered list of stages sharing one completion client.
pub struct SequentialPipeline {
    pub(super) name: String,
    pub(super) stages: Vec<Arc<dyn Stage>>,
    pub(super) client: Arc<dyn CompletionClient>,
    pub(super) context: RunContext,
    pub(super) synthesizer: Arc<dyn Synthesizer>,
    pub(super) global_fallback: Arc<GlobalFallback>,
}

impl std::fmt::Debug for SequentialPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialPipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl SequentialPipeline {
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

    /// Returns the shared services this pipeline reports into.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Runs every stage in order and synthesizes the result.
    ///
    /// Never fails. A failed completion degrades the stage to its
    /// fallback; a fault in the runner itself, or every stage degrading,
    /// yields the pipeline's global fallback result.
    pub async fn execute(&self, state: PipelineState) -> PipelineRun {
        let span = info_span!("pipeline.run", pipeline = %self.name, run_id = %state.run_id);
        self.execute_inner(state).instrument(span).await
    }

    async fn execute_inner(&self, mut state: PipelineState) -> PipelineRun {
        let start = Instant::now();
        let run_id = state.run_id;
        self.context.tracker.reset_run(run_id, &self.stage_names());

        let user = self
            .context
            .users
            .as_ref()
            .and_then(|users| users.get(&state.user_id));

        info!(stages = self.stages.len(), "Pipeline started");

        if let Err(fault) = self.run_stages(&mut state, user.as_ref()).await {
            error!(error = %fault, "Pipeline fault, returning fallback result");
            let result = self.fall_back(&state, &fault.to_string());
            return PipelineRun { state, result };
        }

        if state.degraded().len() == self.stages.len() {
            warn!("Every stage degraded, returning fallback result");
            let result = self.fall_back(&state, "every stage degraded");
            return PipelineRun { state, result };
        }

        let synthesized = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.synthesizer.synthesize(&self.name, &state)
        }));
        let result = match synthesized {
            Ok(mut result) => {
                result.generated_at = Utc::now();
                result
            }
            Err(panic) => {
                let fault = RunnerFault::Panicked {
                    stage: "synthesizer".to_string(),
                    message: panic_message(panic.as_ref()),
                };
                error!(error = %fault, "Synthesizer fault, returning fallback result");
                self.fall_back(&state, &fault.to_string())
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            duration_ms,
            degraded = state.degraded().len(),
            "Pipeline completed"
        );

        PipelineRun { state, result }
    }

    async fn run_stages(
        &self,
        state: &mut PipelineState,
        user: Option<&UserRecord>,
    ) -> Result<(), RunnerFault> {
        for (index, stage) in self.stages.iter().enumerate() {
            let span = info_span!("pipeline.stage", stage = %stage.name(), index);
            let outcome = AssertUnwindSafe(
                execute_stage(stage.as_ref(), self.client.as_ref(), &self.context, state, user)
                    .instrument(span),
            )
            .catch_unwind()
            .await;

            match outcome {
                Ok(result) => result?,
                Err(panic) => {
                    return Err(RunnerFault::Panicked {
                        stage: stage.name().to_string(),
                        message: panic_message(panic.as_ref()),
                    })
                }
            }

            if let Some(next) = self.stages.get(index + 1) {
                self.hand_off(state, stage.name(), next.name()).await;
            }
        }
        Ok(())
    }

    async fn hand_off(&self, state: &PipelineState, from: &str, to: &str) {
        let Some(bus) = &self.context.handoff else {
            return;
        };
        let payload = state.result(from).cloned().unwrap_or_default();
        let msg = AgentMessage::handoff(state.run_id, from, to, payload);
        if let Err(err) = bus.send(msg).await {
            warn!(from, to, error = %err, "Handoff message dropped");
        }
    }

    fn fall_back(&self, state: &PipelineState, cause: &str) -> FinalResult {
        let mut result = (self.global_fallback)(state);
        result.run_id = state.run_id;
        result.pipeline.clone_from(&self.name);
        result.fallback = true;
        result.generated_at = Utc::now();

        // Any entry that is not the run's own output is canned.
        let mut degraded = state.degraded().clone();
        for (stage, value) in &result.stage_results {
            if state.result(stage) != Some(value) {
                degraded.insert(stage.clone());
            }
        }
        result.degraded = degraded;
        for (stage, value) in state.stage_results() {
            result
                .stage_results
                .entry(stage.clone())
                .or_insert_with(|| value.clone());
        }

        self.context.tracker.complete_run(state.run_id);
        self.context.log.record(
            ActivityRecord::new(&self.name, "fallback")
                .for_run(state.run_id)
                .with_detail(format!("{} pipeline fell back: {cause}", self.name))
                .degraded(),
        );
        result
    }
}

/// Runs one stage against the state.
///
/// Moves the stage through `active`, `thinking` and `complete`, records an
/// activity entry and merges the normalized output (or the fallback, when
/// the completion call fails) into `state`.
///
/// # Errors
///
/// Returns a [`RunnerFault`] if a declared dependency has no result yet or
/// the stage already produced one. Completion failures are not errors.
pub async fn execute_stage(
    stage: &dyn Stage,
    client: &dyn CompletionClient,
    context: &RunContext,
    state: &mut PipelineState,
    user: Option<&UserRecord>,
) -> Result<(), RunnerFault> {
    let name = stage.name();
    let run_id = state.run_id;

    if let Some(missing) = stage.dependencies().iter().find(|dep| !state.has_result(dep)) {
        return Err(RunnerFault::MissingDependency {
            stage: name.to_string(),
            dependency: missing.clone(),
        });
    }
    if state.has_result(name) {
        return Err(OutputConflictError::new(name, "stage already produced a result").into());
    }

    let start = Instant::now();
    context.tracker.set_status(run_id, name, StageStatus::Active);
    let payload = stage.payload(state, user);

    context.tracker.set_status(run_id, name, StageStatus::Thinking);
    debug!(role = stage.role(), "Requesting completion");

    let (value, degraded, record) =
        match client.complete(stage.role(), stage.system_prompt(), &payload).await {
            Ok(raw) => {
                let value = stage.normalize(raw);
                let record = ActivityRecord::completed(run_id, name, value.clone());
                (value, false, record)
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "Completion failed, using fallback output");
                let value = stage.fallback(state);
                let record =
                    ActivityRecord::fell_back(run_id, name, &err.to_string(), value.clone());
                (value, true, record)
            }
        };

    context.log.record(record);
    context.tracker.set_status(run_id, name, StageStatus::Complete);
    state.record(name, value, degraded)?;

    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(duration_ms, degraded, "Stage completed");
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
