//! Shared state of one pipeline run.

use crate::events::{EventSink, NoOpEventSink};
use crate::progress::{ProgressSink, StdoutProgress};
use std::sync::Arc;
use uuid::Uuid;

/// Identity and output channels shared by the controller and stage runner.
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    events: Arc<dyn EventSink>,
    progress: Arc<dyn ProgressSink>,
}

impl RunContext {
    /// Creates a context with a fresh run id, stdout progress and no events.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: crate::utils::generate_run_id(),
            events: Arc::new(NoOpEventSink),
            progress: Arc::new(StdoutProgress),
        }
    }

    /// Sets the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the event sink.
    #[must_use]
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Returns the progress sink.
    #[must_use]
    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress.as_ref()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
