//! `stackflow`: reconcile the platform stacks, or tear them down with
//! `stackflow destroy`.

use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use stackflow::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("{err}");
    }
    ExitCode::from(exit_status(&result))
}

async fn run() -> anyhow::Result<PipelineReport> {
    init_logging(LogFormat::from_env()).context("failed to install log subscriber")?;

    let mode = RunMode::from_args(std::env::args().skip(1));
    let config = PipelineConfig::default();
    let settings = EngineSettings::from_env();
    info!(%mode, work_dir = %settings.work_dir.display(), "starting stackflow");

    let context = RunContext::new()
        .with_event_sink(Arc::new(LoggingEventSink))
        .with_progress(Arc::new(StdoutProgress));
    let runner = EngineStageRunner::new(
        &config,
        Arc::new(PulumiCliEngine::new(settings)),
        Arc::new(ProcessEnv),
    )
    .with_context(context.clone());

    let report = PipelineController::new(config, runner)
        .with_context(context)
        .run(mode)
        .await?;
    Ok(report)
}

/// Zero on success, one on any failure.
fn exit_status<T>(result: &anyhow::Result<T>) -> u8 {
    u8::from(result.is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stackflow::testing::{EngineOp, RecordingEngine, TestPipeline};

    #[tokio::test]
    async fn test_successful_run_exits_zero() {
        let harness = TestPipeline::default();
        let result = harness.run(RunMode::Apply).await.map_err(anyhow::Error::from);

        assert_eq!(exit_status(&result), 0);
    }

    #[tokio::test]
    async fn test_failed_run_exits_one() {
        let harness = TestPipeline::default()
            .with_engine(RecordingEngine::new().failing(EngineOp::Apply, "data"));
        let result = harness.run(RunMode::Apply).await.map_err(anyhow::Error::from);

        assert_eq!(exit_status(&result), 1);
        let message = result.unwrap_err().to_string();
        assert!(message.starts_with("Failed to update stack 'dirien/data/dev'"));
    }
}
