//! Log sinks for activity records.
//!
//! A sink is the optional external destination of the activity log (a file,
//! a collector, the tracing subscriber). Sinks are attached to an
//! [`ActivityLog`](crate::tracking::ActivityLog) instance rather than
//! installed globally.

mod sink;

pub use sink::{CollectingLogSink, LogSink, LoggingLogSink, NoOpLogSink};
