//! Core domain model types for seqflow.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - Stage status enum
//! - Per-run pipeline state and run identifiers
//! - Activity records and the final result

mod activity;
mod result;
mod state;
mod status;

pub use activity::ActivityRecord;
pub use result::FinalResult;
pub use state::{PipelineState, RunId};
pub use status::StageStatus;
