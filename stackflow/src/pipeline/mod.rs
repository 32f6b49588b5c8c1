//! Pipeline orchestration.
//!
//! A [`PipelineController`] walks the configured stacks in dependency order
//! through a [`StageRunner`](crate::runner::StageRunner). In destroy mode it
//! then tears the resolved stacks down in reverse.

mod controller;
mod failure;
mod state;

pub use controller::PipelineController;
pub use failure::{FailureCollector, FailureMode, FailureRecord};
pub use state::{PipelineReport, RunState, StackReport, StackStatus};
