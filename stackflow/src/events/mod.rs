//! Event sink system for observability.
//!
//! The controller and stage runner report every lifecycle step to an
//! [`EventSink`]. The default binary logs them; tests collect them.

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
