//! # Seqflow
//!
//! Sequential LLM task pipelines that degrade instead of failing.
//!
//! A pipeline is a fixed, ordered list of stages. Each stage asks a
//! language model for JSON, coerces the answer into its typed schema and
//! merges it into the run state for the next stage. Seqflow provides:
//!
//! - **Per-stage fallback**: a failed completion yields a schema-valid
//!   fallback and marks the stage degraded; the run continues
//! - **Whole-pipeline fallback**: runner faults (including panics) and
//!   total outages return the pipeline's global fallback result
//! - **Run telemetry**: per-run stage status with subscribers, and an
//!   append-only activity log
//! - **Handoff bus**: bounded stage-to-stage messages with an owned consumer
//! - **Domains**: ready-made career-analysis and DevOps pipelines
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seqflow::prelude::*;
//!
//! let client = Arc::new(HttpCompletionClient::from_env()?);
//! let service = PipelineService::new(client, RunContext::new())?;
//!
//! let result = service
//!     .run(Domain::Devops, "Deploy my Node.js API with Redis to AWS", "user-1")
//!     .await;
//! println!("{}", result.summary);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod completion;
pub mod config;
pub mod contracts;
pub mod core;
pub mod domains;
pub mod errors;
pub mod events;
pub mod handoff;
pub mod observability;
pub mod pipeline;
pub mod service;
pub mod stages;
pub mod synthesis;
pub mod testing;
pub mod tracking;
pub mod users;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::completion::HttpCompletionClient;
    pub use crate::completion::{CompletionClient, CompletionConfig};
    pub use crate::config::SeqflowConfig;
    pub use crate::core::{ActivityRecord, FinalResult, PipelineState, RunId, StageStatus};
    pub use crate::errors::{
        CompletionError, ContractErrorInfo, PipelineValidationError, RunnerFault, SeqflowError,
    };
    pub use crate::events::{LogSink, LoggingLogSink, NoOpLogSink};
    pub use crate::handoff::{AgentMessage, HandoffBus, HandoffConfig, MessageKind};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineBuilder, PipelineRun, RunContext, SequentialPipeline};
    pub use crate::service::{Domain, PipelineService};
    pub use crate::stages::{CompletionStage, Stage};
    pub use crate::synthesis::{NamespacedSynthesizer, Synthesizer};
    pub use crate::tracking::{ActivityLog, ActivityLogConfig, StatusSnapshot, StatusTracker};
    pub use crate::users::{InMemoryUserStore, UserRecord, UserStore};
    pub use std::sync::Arc;
}
