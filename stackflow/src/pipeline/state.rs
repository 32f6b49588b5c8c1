//! Run state machine and the report a run produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::RunMode;

/// Final status of one stack within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// Not reached.
    #[default]
    Pending,
    /// Refreshed only (destroy mode forward pass).
    Refreshed,
    /// Refreshed and applied.
    Applied,
    /// Torn down.
    Destroyed,
    /// An operation on this stack failed.
    Failed,
}

/// A state the pipeline passes through.
///
/// Stage positions are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunState {
    /// Nothing has run yet.
    Start,
    /// Stage n was refreshed in destroy mode.
    Refreshed(usize),
    /// Stage n was applied.
    Applied(usize),
    /// Stage n was destroyed.
    Destroyed(usize),
    /// Every step succeeded.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Refreshed(n) => write!(f, "STAGE{n}_REFRESHED"),
            Self::Applied(n) => write!(f, "STAGE{n}_APPLIED"),
            Self::Destroyed(n) => write!(f, "STAGE{n}_DESTROYED"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Status of one stack in a [`PipelineReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackReport {
    /// Fully-qualified stack name.
    pub stack: String,
    /// Final status.
    pub status: StackStatus,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// The run id.
    pub run_id: Uuid,
    /// The run mode.
    pub mode: RunMode,
    /// Per-stack status in configured order.
    pub stacks: Vec<StackReport>,
    /// Every state reached, in order.
    pub transitions: Vec<RunState>,
}

impl PipelineReport {
    /// Creates a report with every stack pending and the run at `Start`.
    #[must_use]
    pub fn new(run_id: Uuid, mode: RunMode, stacks: Vec<String>) -> Self {
        Self {
            run_id,
            mode,
            stacks: stacks
                .into_iter()
                .map(|stack| StackReport {
                    stack,
                    status: StackStatus::Pending,
                })
                .collect(),
            transitions: vec![RunState::Start],
        }
    }

    /// Sets the status of the stack at `index` (0-based).
    pub fn set_status(&mut self, index: usize, status: StackStatus) {
        if let Some(entry) = self.stacks.get_mut(index) {
            entry.status = status;
        }
    }

    /// Appends a state transition.
    pub fn transition(&mut self, state: RunState) {
        self.transitions.push(state);
    }

    /// Returns the status of a stack by fully-qualified name.
    #[must_use]
    pub fn status_of(&self, stack: &str) -> Option<StackStatus> {
        self.stacks
            .iter()
            .find(|entry| entry.stack == stack)
            .map(|entry| entry.status)
    }

    /// Returns the transitions rendered as state names.
    #[must_use]
    pub fn transition_names(&self) -> Vec<String> {
        self.transitions.iter().map(ToString::to_string).collect()
    }

    /// Returns true once the run reached `Done`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.transitions.last() == Some(&RunState::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_state_names() {
        assert_eq!(RunState::Start.to_string(), "START");
        assert_eq!(RunState::Applied(2).to_string(), "STAGE2_APPLIED");
        assert_eq!(RunState::Refreshed(1).to_string(), "STAGE1_REFRESHED");
        assert_eq!(RunState::Destroyed(3).to_string(), "STAGE3_DESTROYED");
        assert_eq!(RunState::Done.to_string(), "DONE");
    }

    #[test]
    fn test_report_tracks_status() {
        let mut report = PipelineReport::new(
            Uuid::nil(),
            RunMode::Apply,
            vec!["dirien/infra/dev".to_string(), "dirien/app/dev".to_string()],
        );
        report.set_status(0, StackStatus::Applied);
        report.transition(RunState::Applied(1));
        report.set_status(7, StackStatus::Failed);

        assert_eq!(report.status_of("dirien/infra/dev"), Some(StackStatus::Applied));
        assert_eq!(report.status_of("dirien/app/dev"), Some(StackStatus::Pending));
        assert_eq!(report.transition_names(), vec!["START", "STAGE1_APPLIED"]);
        assert!(!report.is_done());
    }
}
