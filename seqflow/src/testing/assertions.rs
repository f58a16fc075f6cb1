//! Test assertions for pipeline results.

use crate::core::{FinalResult, PipelineState};

/// Asserts that no stage degraded and no global fallback was used.
pub fn assert_clean(result: &FinalResult) {
    assert!(
        result.is_clean(),
        "Expected a clean result, got degraded: {:?}, fallback: {}",
        result.degraded,
        result.fallback
    );
}

/// Asserts that exactly the given stages degraded.
pub fn assert_degraded_exactly(result: &FinalResult, stages: &[&str]) {
    let actual: Vec<&str> = result.degraded.iter().map(String::as_str).collect();
    let mut expected = stages.to_vec();
    expected.sort_unstable();
    assert_eq!(
        actual, expected,
        "Expected degraded stages {expected:?}, got {actual:?}"
    );
}

/// Asserts that the result has an entry for every given stage.
pub fn assert_has_stages(result: &FinalResult, stages: &[&str]) {
    for stage in stages {
        assert!(
            result.stage_results.contains_key(*stage),
            "Expected result to contain stage '{}', but it doesn't. Stages: {:?}",
            stage,
            result.stage_results.keys().collect::<Vec<_>>()
        );
    }
}

/// Asserts that the state's stages completed in exactly the given order.
pub fn assert_completed_in_order(state: &PipelineState, stages: &[&str]) {
    let actual: Vec<&str> = state.completed().iter().map(String::as_str).collect();
    assert_eq!(
        actual, stages,
        "Expected completion order {stages:?}, got {actual:?}"
    );
}
