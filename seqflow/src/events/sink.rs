//! Log sink trait and implementations.

use crate::core::ActivityRecord;
use crate::errors::SinkError;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Trait for sinks that receive activity records.
///
/// Appends are fire-and-forget from the pipeline's point of view: the
/// activity log swallows any error after logging it.
pub trait LogSink: Send + Sync {
    /// Returns a short name used in diagnostics.
    fn name(&self) -> &str;

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink could not accept the entry.
    fn append(&self, entry: &ActivityRecord) -> Result<(), SinkError>;
}

/// A no-op sink that discards all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn name(&self) -> &str {
        "noop"
    }

    fn append(&self, _entry: &ActivityRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that writes entries through the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingLogSink {
    level: Level,
}

impl Default for LoggingLogSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingLogSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl LogSink for LoggingLogSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn append(&self, entry: &ActivityRecord) -> Result<(), SinkError> {
        let run_id = entry.run_id.map(|id| id.to_string()).unwrap_or_default();
        if self.level == Level::DEBUG {
            debug!(
                stage = %entry.stage,
                action = %entry.action,
                run_id = %run_id,
                degraded = entry.degraded,
                "{}", entry.detail
            );
        } else {
            info!(
                stage = %entry.stage,
                action = %entry.action,
                run_id = %run_id,
                degraded = entry.degraded,
                "{}", entry.detail
            );
        }
        Ok(())
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogSink {
    entries: RwLock<Vec<ActivityRecord>>,
}

impl CollectingLogSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ActivityRecord> {
        self.entries.read().clone()
    }

    /// Returns the number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns entries whose action matches.
    #[must_use]
    pub fn entries_with_action(&self, action: &str) -> Vec<ActivityRecord> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.action == action)
            .cloned()
            .collect()
    }
}

impl LogSink for CollectingLogSink {
    fn name(&self) -> &str {
        "collecting"
    }

    fn append(&self, entry: &ActivityRecord) -> Result<(), SinkError> {
        self.entries.write().push(entry.clone());
        Ok(())
    }
}
