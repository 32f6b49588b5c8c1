//! Test fixtures for pipeline runs.

use std::sync::Arc;

use super::RecordingEngine;
use crate::config::{PipelineConfig, RunMode, StackDescriptor};
use crate::context::RunContext;
use crate::errors::OrchestratorError;
use crate::events::CollectingEventSink;
use crate::pipeline::{PipelineController, PipelineReport};
use crate::progress::CollectingProgress;
use crate::runner::EngineStageRunner;
use crate::secrets::StaticEnv;

/// Source URL used by fixture stacks.
pub const SAMPLE_SOURCE_URL: &str = "https://example.com/platform.git";

/// Three stacks `infra`, `data` and `app`, each bound to one secret.
#[must_use]
pub fn sample_config() -> PipelineConfig {
    PipelineConfig::new(vec![
        StackDescriptor::new("infra", SAMPLE_SOURCE_URL, "main", "infra")
            .with_secret("infra:token", "INFRA_TOKEN"),
        StackDescriptor::new("data", SAMPLE_SOURCE_URL, "main", "data")
            .with_secret("data:apiToken", "DATA_TOKEN"),
        StackDescriptor::new("app", SAMPLE_SOURCE_URL, "main", "app")
            .with_secret("app:license", "APP_LICENSE"),
    ])
}

/// A full pipeline wired to in-memory collaborators.
#[derive(Debug)]
pub struct TestPipeline {
    /// Pipeline configuration.
    pub config: PipelineConfig,
    /// The recording engine.
    pub engine: Arc<RecordingEngine>,
    /// Secret variables.
    pub env: Arc<StaticEnv>,
    /// Collected console output.
    pub progress: Arc<CollectingProgress>,
    /// Collected events.
    pub events: Arc<CollectingEventSink>,
}

impl TestPipeline {
    /// Creates a harness for `config` with an always-succeeding engine.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            engine: Arc::new(RecordingEngine::new()),
            env: Arc::new(StaticEnv::new()),
            progress: Arc::new(CollectingProgress::new()),
            events: Arc::new(CollectingEventSink::new()),
        }
    }

    /// Replaces the engine.
    #[must_use]
    pub fn with_engine(mut self, engine: RecordingEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Sets a secret variable.
    #[must_use]
    pub fn with_var(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.set(name, value);
        self
    }

    /// Builds the controller.
    #[must_use]
    pub fn controller(&self) -> PipelineController<EngineStageRunner> {
        let context = RunContext::new()
            .with_progress(self.progress.clone())
            .with_event_sink(self.events.clone());
        let runner = EngineStageRunner::new(&self.config, self.engine.clone(), self.env.clone())
            .with_context(context.clone());
        PipelineController::new(self.config.clone(), runner).with_context(context)
    }

    /// Runs the pipeline once.
    pub async fn run(&self, mode: RunMode) -> Result<PipelineReport, OrchestratorError> {
        self.controller().run(mode).await
    }
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new(sample_config())
    }
}
