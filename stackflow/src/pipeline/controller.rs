//! Ordered forward pass and reverse teardown.

use tracing::{error, info, info_span, Instrument};

use super::failure::FailureCollector;
use super::state::{PipelineReport, RunState, StackStatus};
use crate::config::{PipelineConfig, RunMode};
use crate::context::RunContext;
use crate::engine::StackHandle;
use crate::errors::OrchestratorError;
use crate::events::PipelineEvent;
use crate::observability::SpanTimer;
use crate::runner::StageRunner;

/// Runs every configured stack in order and, in destroy mode, tears them
/// down in reverse.
#[derive(Debug)]
pub struct PipelineController<R> {
    config: PipelineConfig,
    runner: R,
    context: RunContext,
}

impl<R: StageRunner> PipelineController<R> {
    /// Creates a new controller.
    #[must_use]
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            context: RunContext::new(),
        }
    }

    /// Sets the run context used for pipeline-level events.
    #[must_use]
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    /// Executes the pipeline.
    ///
    /// The forward pass stops at the first failing stack with nothing rolled
    /// back. In destroy mode the teardown pass only starts once every stack
    /// was refreshed.
    ///
    /// # Errors
    ///
    /// Returns the first failure of either pass, or an invalid configuration.
    pub async fn run(&self, mode: RunMode) -> Result<PipelineReport, OrchestratorError> {
        self.config.validate()?;

        let run_id = self.context.run_id();
        let stacks: Vec<String> = self
            .config
            .stacks
            .iter()
            .map(|d| self.config.identity_for(d).fully_qualified())
            .collect();

        let span = info_span!("pipeline", run_id = %run_id, mode = %mode);
        async move {
            info!(stacks = stacks.len(), "pipeline started");
            self.context
                .events()
                .emit(PipelineEvent::pipeline_started(run_id, &mode.to_string(), &stacks))
                .await;

            let timer = SpanTimer::start("pipeline");
            let mut report = PipelineReport::new(run_id, mode, stacks);

            match self.execute(mode, &mut report).await {
                Ok(()) => {
                    report.transition(RunState::Done);
                    let duration_ms = timer.finish();
                    info!(
                        duration_ms,
                        transitions = ?report.transition_names(),
                        "pipeline completed"
                    );
                    self.context
                        .events()
                        .emit(PipelineEvent::pipeline_completed(run_id, duration_ms))
                        .await;
                    Ok(report)
                }
                Err(err) => {
                    error!(
                        error = %err,
                        transitions = ?report.transition_names(),
                        "pipeline failed"
                    );
                    self.context
                        .events()
                        .emit(PipelineEvent::pipeline_failed(run_id, &err.to_string()))
                        .await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, mode: RunMode, report: &mut PipelineReport) -> Result<(), OrchestratorError> {
        let handles = self.forward(mode, report).await?;
        if mode.is_destroy() {
            self.teardown(handles, report).await?;
        }
        Ok(())
    }

    async fn forward(
        &self,
        mode: RunMode,
        report: &mut PipelineReport,
    ) -> Result<Vec<StackHandle>, OrchestratorError> {
        let destroy = mode.is_destroy();
        let mut handles = Vec::with_capacity(self.config.stacks.len());

        for (index, descriptor) in self.config.stacks.iter().enumerate() {
            let descriptor = descriptor.with_destroy(destroy);
            match self.runner.run_stage(&descriptor).await {
                Ok(handle) => {
                    let (status, state) = if destroy {
                        (StackStatus::Refreshed, RunState::Refreshed(index + 1))
                    } else {
                        (StackStatus::Applied, RunState::Applied(index + 1))
                    };
                    report.set_status(index, status);
                    report.transition(state);
                    handles.push(handle);
                }
                Err(err) => {
                    report.set_status(index, StackStatus::Failed);
                    return Err(err);
                }
            }
        }
        Ok(handles)
    }

    /// Destroys handles last-in first-out.
    async fn teardown(
        &self,
        handles: Vec<StackHandle>,
        report: &mut PipelineReport,
    ) -> Result<(), OrchestratorError> {
        let mut failures = FailureCollector::new(self.config.teardown_failure_mode);

        for (index, handle) in handles.iter().enumerate().rev() {
            match self.runner.destroy_stage(handle).await {
                Ok(()) => {
                    report.set_status(index, StackStatus::Destroyed);
                    report.transition(RunState::Destroyed(index + 1));
                }
                Err(err) => {
                    report.set_status(index, StackStatus::Failed);
                    failures.record(&handle.name(), err);
                    if failures.should_stop() {
                        break;
                    }
                }
            }
        }

        if failures.has_failures() {
            error!(failures = ?failures.records(), "teardown incomplete");
        }
        failures.into_result()
    }
}
