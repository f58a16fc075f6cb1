//! Messages exchanged between pipeline agents.

use crate::core::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What an agent message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Work passed from one stage to the next.
    Handoff,
    /// A status announcement.
    Status,
    /// A final result announcement.
    Result,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handoff => write!(f, "handoff"),
            Self::Status => write!(f, "status"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// A message from one agent to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message ID.
    pub id: Uuid,
    /// The run the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Sending agent.
    pub from: String,
    /// Receiving agent.
    pub to: String,
    /// Message kind.
    pub kind: MessageKind,
    /// Message body.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: None,
            from: from.into(),
            to: to.into(),
            kind,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Creates a handoff between two consecutive stages.
    #[must_use]
    pub fn handoff(run_id: RunId, from: &str, to: &str, payload: serde_json::Value) -> Self {
        Self::new(from, to, MessageKind::Handoff)
            .for_run(run_id)
            .with_payload(payload)
    }

    /// Sets the run ID.
    #[must_use]
    pub fn for_run(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_message() {
        let run = RunId::new();
        let msg = AgentMessage::handoff(run, "planner", "builder", serde_json::json!({"ok": true}));
        assert_eq!(msg.kind, MessageKind::Handoff);
        assert_eq!(msg.run_id, Some(run));
        assert_eq!(msg.to, "builder");
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_value(MessageKind::Result).unwrap(), "result");
        assert_eq!(MessageKind::Status.to_string(), "status");
    }
}
