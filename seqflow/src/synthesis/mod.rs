//! Turning a finished pipeline state into the caller-visible result.

use crate::core::{FinalResult, PipelineState};

/// Builds a [`FinalResult`] from a finished state.
///
/// Implementations must be pure: no I/O and no clock. The same state must
/// yield an equal result; the runner stamps `generated_at` afterwards.
pub trait Synthesizer: Send + Sync {
    /// Synthesizes the final result for a pipeline.
    fn synthesize(&self, pipeline: &str, state: &PipelineState) -> FinalResult;
}

/// Copies every stage's output under its stage name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespacedSynthesizer;

impl NamespacedSynthesizer {
    /// Creates a new synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Synthesizer for NamespacedSynthesizer {
    fn synthesize(&self, pipeline: &str, state: &PipelineState) -> FinalResult {
        let mut result = FinalResult::at(state.run_id, pipeline, state.started_at);
        result.stage_results = state.stage_results().clone();
        result.degraded = state.degraded().clone();
        result.summary = summarize(pipeline, state);
        result
    }
}

fn summarize(pipeline: &str, state: &PipelineState) -> String {
    let total = state.stage_results().len();
    match state.degraded().len() {
        0 => format!("{pipeline} pipeline completed {total} stages"),
        n => format!(
            "{pipeline} pipeline completed {total} stages ({n} degraded: {})",
            state.degraded().iter().cloned().collect::<Vec<_>>().join(", ")
        ),
    }
}
