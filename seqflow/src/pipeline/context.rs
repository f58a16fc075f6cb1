//! Shared services a pipeline run reports into.

use crate::handoff::HandoffBus;
use crate::tracking::{ActivityLog, StatusTracker};
use crate::users::UserStore;
use std::sync::Arc;

/// The shared, internally synchronized services used by every run.
///
/// Cloning is cheap; clones share the same tracker, log and bus, so
/// several pipelines can report into one UI.
#[derive(Clone, Default)]
pub struct RunContext {
    /// Per-run stage status.
    pub tracker: Arc<StatusTracker>,
    /// Append-only activity log.
    pub log: Arc<ActivityLog>,
    /// Optional bus for stage-to-stage handoff messages.
    pub handoff: Option<Arc<HandoffBus>>,
    /// Optional read-only user store.
    pub users: Option<Arc<dyn UserStore>>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("tracker", &self.tracker)
            .field("log", &self.log)
            .field("handoff", &self.handoff)
            .field("users", &self.users.is_some())
            .finish()
    }
}

impl RunContext {
    /// Creates a context with a fresh tracker and an unbounded log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific status tracker.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<StatusTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Uses a specific activity log.
    #[must_use]
    pub fn with_log(mut self, log: Arc<ActivityLog>) -> Self {
        self.log = log;
        self
    }

    /// Publishes handoff messages on the given bus.
    #[must_use]
    pub fn with_handoff(mut self, bus: Arc<HandoffBus>) -> Self {
        self.handoff = Some(bus);
        self
    }

    /// Looks users up in the given store.
    #[must_use]
    pub fn with_users(mut self, users: Arc<dyn UserStore>) -> Self {
        self.users = Some(users);
        self
    }
}
