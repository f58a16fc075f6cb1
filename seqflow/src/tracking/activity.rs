//! Append-only activity log.

use crate::core::{ActivityRecord, RunId};
use crate::events::LogSink;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Configuration for the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogConfig {
    /// Maximum number of retained records; `None` keeps everything.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Buffer size of the broadcast channel for live subscribers.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl ActivityLogConfig {
    /// Creates an unbounded configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the log; the oldest record is dropped when full.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }
}

/// Timestamped record of what each stage did.
///
/// Records are never mutated. Without a capacity the log grows for the life
/// of the process; with one it behaves as a drop-oldest ring buffer.
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityRecord>>,
    capacity: Option<usize>,
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
    live: broadcast::Sender<ActivityRecord>,
    evicted: AtomicU64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(ActivityLogConfig::default())
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

impl ActivityLog {
    /// Creates a log from configuration.
    #[must_use]
    pub fn new(config: ActivityLogConfig) -> Self {
        let (live, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: config.capacity,
            sinks: RwLock::new(Vec::new()),
            live,
            evicted: AtomicU64::new(0),
        }
    }

    /// Attaches an external sink.
    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks.write().push(sink);
    }

    /// Appends a record, forwards it to sinks and live subscribers.
    pub fn record(&self, entry: ActivityRecord) {
        for sink in self.sinks.read().iter() {
            if let Err(err) = sink.append(&entry) {
                warn!(sink = %sink.name(), error = %err, "Log sink append failed");
            }
        }
        let _ = self.live.send(entry.clone());

        let mut entries = self.entries.write();
        entries.push_back(entry);
        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                entries.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns up to `n` records, most recent first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ActivityRecord> {
        self.entries.read().iter().rev().take(n).cloned().collect()
    }

    /// Returns every record of one run, oldest first.
    #[must_use]
    pub fn for_run(&self, run_id: RunId) -> Vec<ActivityRecord> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.run_id == Some(run_id))
            .cloned()
            .collect()
    }

    /// Returns a live stream of new records.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityRecord> {
        self.live.subscribe()
    }

    /// Returns the number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns how many records were dropped to respect the capacity.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
