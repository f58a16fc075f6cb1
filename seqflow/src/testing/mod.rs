//! Testing utilities for seqflow pipelines.
//!
//! This module provides:
//! - A scripted completion client with per-role answers and failures
//! - Stages that misbehave on purpose
//! - Assertions over final results

mod assertions;
mod mocks;

pub use assertions::{
    assert_clean, assert_completed_in_order, assert_degraded_exactly, assert_has_stages,
};
pub use mocks::{PanickingStage, RecordedCall, ScriptedCompletionClient};
