//! Bounded handoff bus between pipeline agents.
//!
//! Messages go through a bounded channel to a single consumer task owned by
//! the bus. A full queue is visible to the sender (`send` waits, `try_send`
//! fails) and shutdown drains what is queued before returning.

mod message;

pub use message::{AgentMessage, MessageKind};

use crate::core::ActivityRecord;
use crate::errors::HandoffError;
use crate::tracking::ActivityLog;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Configuration for the handoff bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Maximum number of queued messages.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Counters reported when the bus shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandoffStats {
    /// Messages handed to the consumer and recorded.
    pub delivered: u64,
    /// Messages refused because the queue was full.
    pub rejected: u64,
}

/// A bounded message queue with an owned consumer task.
pub struct HandoffBus {
    tx: RwLock<Option<mpsc::Sender<AgentMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
    delivered: Arc<AtomicU64>,
    rejected: AtomicU64,
}

impl std::fmt::Debug for HandoffBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffBus")
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl HandoffBus {
    /// Starts the bus; every delivered message is recorded in `log`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: &HandoffConfig, log: Arc<ActivityLog>) -> Self {
        let capacity = config.capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<AgentMessage>(capacity);
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = delivered.clone();

        let worker = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let mut record = ActivityRecord::new(&msg.from, "handoff")
                    .with_detail(format!("{} -> {} ({})", msg.from, msg.to, msg.kind))
                    .with_result(msg.payload);
                if let Some(run_id) = msg.run_id {
                    record = record.for_run(run_id);
                }
                log.record(record);
                counter.fetch_add(1, Ordering::Relaxed);
            }
            debug!("Handoff consumer drained");
        });

        Self {
            tx: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            capacity,
            delivered,
            rejected: AtomicU64::new(0),
        }
    }

    /// Queues a message, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::Closed`] after shutdown.
    pub async fn send(&self, msg: AgentMessage) -> Result<(), HandoffError> {
        let tx = self.tx.read().clone().ok_or(HandoffError::Closed)?;
        tx.send(msg).await.map_err(|_| HandoffError::Closed)
    }

    /// Queues a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::Full`] if the queue is at capacity and
    /// [`HandoffError::Closed`] after shutdown.
    pub fn try_send(&self, msg: AgentMessage) -> Result<(), HandoffError> {
        let guard = self.tx.read();
        let tx = guard.as_ref().ok_or(HandoffError::Closed)?;
        tx.try_send(msg).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                HandoffError::Full {
                    capacity: self.capacity,
                }
            }
            mpsc::error::TrySendError::Closed(_) => HandoffError::Closed,
        })
    }

    /// Returns the number of queued, not yet consumed messages.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tx
            .read()
            .as_ref()
            .map_or(0, |tx| self.capacity - tx.capacity())
    }

    /// Returns true once shutdown has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Closes the queue, drains queued messages and joins the consumer.
    pub async fn shutdown(&self) -> HandoffStats {
        drop(self.tx.write().take());
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(err) = handle.await {
                error!(error = %err, "Handoff consumer terminated abnormally");
            }
        }
        self.stats()
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunId;

    #[tokio::test]
    async fn test_messages_are_recorded() {
        let log = Arc::new(ActivityLog::default());
        let bus = HandoffBus::start(&HandoffConfig::default(), log.clone());
        let run = RunId::new();

        bus.send(AgentMessage::handoff(run, "planner", "builder", serde_json::json!({})))
            .await
            .unwrap();
        bus.send(AgentMessage::handoff(run, "builder", "tester", serde_json::json!({})))
            .await
            .unwrap();

        let stats = bus.shutdown().await;
        assert_eq!(stats.delivered, 2);

        let records = log.for_run(run);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "handoff");
        assert!(records[1].detail.contains("builder -> tester"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_try_send_reports_full_queue() {
        let log = Arc::new(ActivityLog::default());
        let bus = HandoffBus::start(&HandoffConfig { capacity: 1 }, log);

        // The consumer cannot run until this task yields.
        bus.try_send(AgentMessage::new("a", "b", MessageKind::Status)).unwrap();
        let err = bus
            .try_send(AgentMessage::new("a", "b", MessageKind::Status))
            .unwrap_err();
        assert_eq!(err, HandoffError::Full { capacity: 1 });
        assert_eq!(bus.pending(), 1);

        let stats = bus.shutdown().await;
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let bus = HandoffBus::start(&HandoffConfig::default(), Arc::new(ActivityLog::default()));
        bus.shutdown().await;

        assert!(bus.is_closed());
        assert_eq!(
            bus.send(AgentMessage::new("a", "b", MessageKind::Result)).await,
            Err(HandoffError::Closed)
        );
        assert_eq!(
            bus.try_send(AgentMessage::new("a", "b", MessageKind::Result)),
            Err(HandoffError::Closed)
        );
    }
}
