//! Entry point for running a domain pipeline from a request.
//!
//! This is the operation behind `POST /pipeline/run {input, userId}`: pick
//! the domain, run it, and always hand back a well-formed result.

use crate::completion::CompletionClient;
use crate::config::SeqflowConfig;
use crate::core::{FinalResult, PipelineState};
use crate::domains::{career, devops};
use crate::errors::{PipelineValidationError, SeqflowError};
use crate::events::LoggingLogSink;
use crate::handoff::{HandoffBus, HandoffStats};
use crate::pipeline::{RunContext, SequentialPipeline};
use crate::tracking::{ActivityLog, StatusTracker};
use crate::users::UserStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// The pipeline a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Resume analysis.
    Career,
    /// Deployment commands.
    Devops,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Career => write!(f, "{}", career::PIPELINE),
            Self::Devops => write!(f, "{}", devops::PIPELINE),
        }
    }
}

impl FromStr for Domain {
    type Err = SeqflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "career" | "resume" => Ok(Self::Career),
            "devops" | "deployment" => Ok(Self::Devops),
            other => Err(PipelineValidationError::new(format!("Unknown pipeline '{other}'")).into()),
        }
    }
}

/// Both domain pipelines sharing one context.
#[derive(Debug)]
pub struct PipelineService {
    career: SequentialPipeline,
    devops: SequentialPipeline,
    context: RunContext,
}

impl PipelineService {
    /// Builds both pipelines over one client and context.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline's stage wiring is invalid.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        context: RunContext,
    ) -> Result<Self, SeqflowError> {
        Ok(Self {
            career: career::pipeline(client.clone(), context.clone())?,
            devops: devops::pipeline(client, context.clone())?,
            context,
        })
    }

    /// Builds a service from configuration, starting the handoff bus,
    /// bounding the status tracker and mirroring activity records to
    /// `tracing`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipeline's stage wiring is invalid.
    pub fn from_config(
        config: &SeqflowConfig,
        client: Arc<dyn CompletionClient>,
        users: Option<Arc<dyn UserStore>>,
    ) -> Result<Self, SeqflowError> {
        let log = Arc::new(ActivityLog::new(config.activity.clone()));
        log.add_sink(Arc::new(LoggingLogSink::default()));
        let bus = Arc::new(HandoffBus::start(&config.handoff, log.clone()));
        let tracker = Arc::new(StatusTracker::with_retention(config.status_retention));
        let mut context = RunContext::new()
            .with_tracker(tracker)
            .with_log(log)
            .with_handoff(bus);
        if let Some(users) = users {
            context = context.with_users(users);
        }
        Self::new(client, context)
    }

    /// Runs the pipeline for `domain`. Never fails.
    pub async fn run(&self, domain: Domain, input: &str, user_id: &str) -> FinalResult {
        info!(%domain, user_id, "Pipeline requested");
        let state = PipelineState::new(input, user_id);
        self.pipeline(domain).execute(state).await.result
    }

    /// Returns the pipeline for a domain.
    #[must_use]
    pub fn pipeline(&self, domain: Domain) -> &SequentialPipeline {
        match domain {
            Domain::Career => &self.career,
            Domain::Devops => &self.devops,
        }
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Drains and stops the handoff bus, if one is attached.
    pub async fn shutdown(&self) -> Option<HandoffStats> {
        match &self.context.handoff {
            Some(bus) => Some(bus.shutdown().await),
            None => None,
        }
    }
}
