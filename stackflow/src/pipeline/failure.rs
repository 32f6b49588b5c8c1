//! Failure tolerance for the teardown pass.

use serde::{Deserialize, Serialize};

use crate::errors::OrchestratorError;

/// How to handle destroy failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop at the first failure (default).
    #[default]
    FailFast,
    /// Attempt every remaining destroy, then report the first failure.
    BestEffort,
}

/// Record of a failed stack operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Fully-qualified stack name.
    pub stack: String,
    /// Error kind, see [`OrchestratorError::kind`].
    pub kind: String,
    /// Error message.
    pub error: String,
}

impl FailureRecord {
    /// Creates a record from an orchestrator error.
    #[must_use]
    pub fn from_error(stack: impl Into<String>, error: &OrchestratorError) -> Self {
        Self {
            stack: stack.into(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}

/// Collects failures and decides whether a pass continues.
#[derive(Debug)]
pub struct FailureCollector {
    /// Failure mode.
    pub mode: FailureMode,
    records: Vec<FailureRecord>,
    first: Option<OrchestratorError>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            records: Vec::new(),
            first: None,
        }
    }

    /// Records a failure. Only the first error is kept for the final result.
    pub fn record(&mut self, stack: &str, error: OrchestratorError) {
        self.records.push(FailureRecord::from_error(stack, &error));
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    /// Returns true if the pass should stop.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        match self.mode {
            FailureMode::FailFast => !self.records.is_empty(),
            FailureMode::BestEffort => false,
        }
    }

    /// Returns true if any failure was recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.records.is_empty()
    }

    /// Returns every recorded failure.
    #[must_use]
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Consumes the collector, returning the first error if any was recorded.
    ///
    /// # Errors
    ///
    /// Returns the first recorded failure.
    pub fn into_result(self) -> Result<(), OrchestratorError> {
        self.first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    fn destroy_error(stack: &str) -> OrchestratorError {
        OrchestratorError::Destroy {
            stack: stack.to_string(),
            source: EngineError::rejected("boom"),
        }
    }

    #[test]
    fn test_fail_fast_stops_after_first_failure() {
        let mut collector = FailureCollector::new(FailureMode::FailFast);
        assert!(!collector.should_stop());

        collector.record("dirien/app/dev", destroy_error("dirien/app/dev"));
        assert!(collector.should_stop());
    }

    #[test]
    fn test_best_effort_keeps_first_error() {
        let mut collector = FailureCollector::new(FailureMode::BestEffort);
        collector.record("dirien/app/dev", destroy_error("dirien/app/dev"));
        collector.record("dirien/data/dev", destroy_error("dirien/data/dev"));

        assert!(!collector.should_stop());
        assert_eq!(collector.records().len(), 2);
        assert_eq!(collector.records()[1].kind, "destroy");

        let err = collector.into_result().unwrap_err();
        assert_eq!(err.stack(), Some("dirien/app/dev"));
    }

    #[test]
    fn test_failure_mode_serde() {
        assert_eq!(
            serde_json::to_string(&FailureMode::BestEffort).unwrap(),
            "\"best_effort\""
        );
        assert_eq!(FailureMode::default(), FailureMode::FailFast);
    }
}
