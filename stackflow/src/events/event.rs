//! Pipeline lifecycle events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An event emitted while a pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stack.refresh.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The run this event belongs to.
    pub run_id: Uuid,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            run_id,
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a data field as a string, if present.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Creates a "pipeline.started" event.
    #[must_use]
    pub fn pipeline_started(run_id: Uuid, mode: &str, stacks: &[String]) -> Self {
        Self::new("pipeline.started", run_id)
            .add_data("mode", serde_json::json!(mode))
            .add_data("stacks", serde_json::json!(stacks))
    }

    /// Creates a "pipeline.completed" event.
    #[must_use]
    pub fn pipeline_completed(run_id: Uuid, duration_ms: f64) -> Self {
        Self::new("pipeline.completed", run_id)
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "pipeline.failed" event.
    #[must_use]
    pub fn pipeline_failed(run_id: Uuid, error: &str) -> Self {
        Self::new("pipeline.failed", run_id).add_data("error", serde_json::json!(error))
    }

    /// Creates a per-stack event such as "stack.resolved".
    #[must_use]
    pub fn stack(event_type: &str, run_id: Uuid, stack: &str) -> Self {
        Self::new(event_type, run_id).add_data("stack", serde_json::json!(stack))
    }

    /// Creates a per-stack completion event carrying a duration.
    #[must_use]
    pub fn stack_completed(event_type: &str, run_id: Uuid, stack: &str, duration_ms: f64) -> Self {
        Self::stack(event_type, run_id, stack).add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stack.failed" event.
    #[must_use]
    pub fn stack_failed(run_id: Uuid, stack: &str, kind: &str, error: &str) -> Self {
        Self::stack("stack.failed", run_id, stack)
            .add_data("kind", serde_json::json!(kind))
            .add_data("error", serde_json::json!(error))
    }
}
