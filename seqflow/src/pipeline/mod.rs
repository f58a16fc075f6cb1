//! Pipeline building and execution.
//!
//! This module provides:
//! - Pipeline builder with validation
//! - The shared run context (status tracker, activity log, handoff bus)
//! - The sequential runner with per-stage and whole-pipeline fallback

mod builder;
mod context;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use builder::{partial_result, PipelineBuilder};
pub use context::RunContext;
pub use runner::{execute_stage, PipelineRun, SequentialPipeline};

use crate::core::{FinalResult, PipelineState};

/// Produces the result returned when a whole run cannot be synthesized.
pub type GlobalFallback = dyn Fn(&PipelineState) -> FinalResult + Send + Sync;
