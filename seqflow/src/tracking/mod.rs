//! Run telemetry: stage status and the activity log.
//!
//! Both are best-effort observability. Nothing in the pipeline reads them
//! back to make a decision.

mod activity;
mod status;

pub use activity::{ActivityLog, ActivityLogConfig};
pub use status::{StatusSnapshot, StatusTracker, Subscription, DEFAULT_RUN_RETENTION};
