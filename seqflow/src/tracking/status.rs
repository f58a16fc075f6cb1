//! Status tracker partitioned by run.

use crate::core::{RunId, StageStatus};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::warn;

const WATCH_CAPACITY: usize = 256;

/// Number of runs a tracker keeps by default.
pub const DEFAULT_RUN_RETENTION: usize = 256;

/// Full status of every stage in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// The run the snapshot belongs to.
    pub run_id: RunId,
    /// Status per stage name.
    pub stages: BTreeMap<String, StageStatus>,
}

impl StatusSnapshot {
    /// Returns the status of a stage, `Idle` if unknown.
    #[must_use]
    pub fn status(&self, stage: &str) -> StageStatus {
        self.stages.get(stage).copied().unwrap_or_default()
    }

    /// Returns true if every tracked stage is complete.
    #[must_use]
    pub fn all_complete(&self) -> bool {
        !self.stages.is_empty() && self.stages.values().all(StageStatus::is_terminal)
    }
}

type Callback = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    callbacks: RwLock<BTreeMap<u64, Callback>>,
}

impl Subscribers {
    fn notify(&self, snapshot: &StatusSnapshot) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback> = self.callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Handle returned by [`StatusTracker::subscribe`].
///
/// The callback stays registered until the handle is dropped or
/// [`unsubscribe`](Self::unsubscribe) is called.
#[must_use = "dropping the subscription unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Detaches the callback.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.callbacks.write().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Tracks `(run, stage) → status` and notifies observers on every change.
///
/// Runs never share status entries, so concurrent runs of the same pipeline
/// cannot overwrite each other's progress. Only the most recent `retention`
/// runs are kept; older ones are forgotten oldest-first.
pub struct StatusTracker {
    runs: DashMap<RunId, BTreeMap<String, StageStatus>>,
    order: Mutex<VecDeque<RunId>>,
    retention: usize,
    subscribers: Arc<Subscribers>,
    watchers: broadcast::Sender<StatusSnapshot>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker")
            .field("runs", &self.runs.len())
            .field("retention", &self.retention)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl StatusTracker {
    /// Creates an empty tracker keeping [`DEFAULT_RUN_RETENTION`] runs.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RUN_RETENTION)
    }

    /// Creates an empty tracker keeping at most `retention` runs (minimum 1).
    #[must_use]
    pub fn with_retention(retention: usize) -> Self {
        let (watchers, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            runs: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            retention: retention.max(1),
            subscribers: Arc::new(Subscribers::default()),
            watchers,
        }
    }

    /// Sets a stage's status and notifies subscribers with the run snapshot.
    ///
    /// Returns `false` (and changes nothing) if the move would take the stage
    /// backwards or skip a step within the run.
    pub fn set_status(&self, run_id: RunId, stage: &str, status: StageStatus) -> bool {
        self.admit(run_id);
        let snapshot = {
            let mut stages = self.runs.entry(run_id).or_default();
            let current = stages.get(stage).copied().unwrap_or_default();
            if !current.can_transition_to(status) {
                warn!(
                    run_id = %run_id,
                    stage = %stage,
                    from = %current,
                    to = %status,
                    "Refusing non-monotonic status transition"
                );
                return false;
            }
            stages.insert(stage.to_string(), status);
            StatusSnapshot {
                run_id,
                stages: stages.clone(),
            }
        };

        self.publish(&snapshot);
        true
    }

    /// Puts every listed stage of a run back to `Idle`.
    pub fn reset_run(&self, run_id: RunId, stages: &[&str]) {
        self.admit(run_id);
        let snapshot = {
            let mut entry = self.runs.entry(run_id).or_default();
            entry.clear();
            for stage in stages {
                entry.insert((*stage).to_string(), StageStatus::Idle);
            }
            StatusSnapshot {
                run_id,
                stages: entry.clone(),
            }
        };
        self.publish(&snapshot);
    }

    /// Moves every unfinished stage of a run straight to `Complete`.
    ///
    /// Used when a run is abandoned, so observers still see it finish.
    /// Publishes one snapshot, and only if something changed.
    pub fn complete_run(&self, run_id: RunId) {
        let snapshot = {
            let Some(mut stages) = self.runs.get_mut(&run_id) else {
                return;
            };
            let mut changed = false;
            for status in stages.values_mut().filter(|s| !s.is_terminal()) {
                *status = StageStatus::Complete;
                changed = true;
            }
            if !changed {
                return;
            }
            StatusSnapshot {
                run_id,
                stages: stages.clone(),
            }
        };
        self.publish(&snapshot);
    }

    /// Forgets a run.
    pub fn clear_run(&self, run_id: RunId) {
        self.order.lock().retain(|id| *id != run_id);
        self.runs.remove(&run_id);
    }

    /// Returns the maximum number of runs kept.
    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Returns the snapshot of one run (empty if the run is unknown).
    #[must_use]
    pub fn get_all(&self, run_id: RunId) -> StatusSnapshot {
        let stages = self
            .runs
            .get(&run_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        StatusSnapshot { run_id, stages }
    }

    /// Returns snapshots of every known run.
    #[must_use]
    pub fn get_all_runs(&self) -> Vec<StatusSnapshot> {
        self.runs
            .iter()
            .map(|entry| StatusSnapshot {
                run_id: *entry.key(),
                stages: entry.value().clone(),
            })
            .collect()
    }

    /// Returns the status of one stage in one run.
    #[must_use]
    pub fn status(&self, run_id: RunId, stage: &str) -> StageStatus {
        self.runs
            .get(&run_id)
            .and_then(|entry| entry.get(stage).copied())
            .unwrap_or_default()
    }

    /// Registers a callback invoked synchronously on every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.callbacks.write().insert(id, Arc::new(callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Returns a stream of snapshots for async observers.
    ///
    /// Slow receivers lose the oldest snapshots (see
    /// [`broadcast::error::RecvError::Lagged`]).
    #[must_use]
    pub fn watch(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.watchers.subscribe()
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.callbacks.read().len()
    }

    fn admit(&self, run_id: RunId) {
        let mut order = self.order.lock();
        if order.contains(&run_id) {
            return;
        }
        order.push_back(run_id);
        while order.len() > self.retention {
            if let Some(evicted) = order.pop_front() {
                self.runs.remove(&evicted);
            }
        }
    }

    fn publish(&self, snapshot: &StatusSnapshot) {
        self.subscribers.notify(snapshot);
        // No receivers is not an error.
        let _ = self.watchers.send(snapshot.clone());
    }
}
