//! End-to-end pipeline runs against the recording engine.

use pretty_assertions::assert_eq;
use stackflow::prelude::*;
use stackflow::testing::{sample_config, EngineOp, RecordingEngine, TestPipeline};

fn harness() -> TestPipeline {
    TestPipeline::new(sample_config())
        .with_var("INFRA_TOKEN", "infra-secret")
        .with_var("DATA_TOKEN", "data-secret")
        .with_var("APP_LICENSE", "app-secret")
}

#[tokio::test]
async fn test_apply_run_reconciles_every_stack() {
    let harness = harness();

    let report = harness.run(RunMode::Apply).await.unwrap();

    assert_eq!(
        harness.engine.call_labels(),
        vec![
            "resolve(infra)",
            "set_secret(infra)",
            "refresh(infra)",
            "apply(infra)",
            "resolve(data)",
            "set_secret(data)",
            "refresh(data)",
            "apply(data)",
            "resolve(app)",
            "set_secret(app)",
            "refresh(app)",
            "apply(app)",
        ]
    );
    assert!(harness.engine.projects_for(EngineOp::Destroy).is_empty());
    assert_eq!(
        report.transition_names(),
        vec!["START", "STAGE1_APPLIED", "STAGE2_APPLIED", "STAGE3_APPLIED", "DONE"]
    );
}

#[tokio::test]
async fn test_destroy_run_refreshes_then_tears_down_in_reverse() {
    let harness = harness();

    let report = harness.run(RunMode::Destroy).await.unwrap();

    assert!(harness.engine.projects_for(EngineOp::Apply).is_empty());
    assert_eq!(
        harness.engine.projects_for(EngineOp::Refresh),
        vec!["infra", "data", "app"]
    );
    assert_eq!(
        harness.engine.projects_for(EngineOp::Destroy),
        vec!["app", "data", "infra"]
    );
    assert_eq!(report.status_of("dirien/data/dev"), Some(StackStatus::Destroyed));
    assert!(report.is_done());
}

#[tokio::test]
async fn test_forward_failure_skips_later_stacks_and_teardown() {
    let harness = harness().with_engine(RecordingEngine::new().failing(EngineOp::Refresh, "data"));

    let err = harness.run(RunMode::Destroy).await.unwrap_err();

    assert_eq!(err.kind(), "refresh");
    assert_eq!(harness.engine.projects_for(EngineOp::Resolve), vec!["infra", "data"]);
    assert!(harness.engine.projects_for(EngineOp::Destroy).is_empty());
    assert_eq!(
        harness.events.event_types().last().map(String::as_str),
        Some("pipeline.failed")
    );
}

#[tokio::test]
async fn test_destroy_failure_aborts_remaining_teardown() {
    let harness = harness().with_engine(RecordingEngine::new().failing(EngineOp::Destroy, "data"));

    let err = harness.run(RunMode::Destroy).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Destroy { .. }));
    assert_eq!(err.stack(), Some("dirien/data/dev"));
    assert_eq!(harness.engine.projects_for(EngineOp::Destroy), vec!["app", "data"]);
    let destroyed = harness
        .progress
        .entries()
        .iter()
        .filter(|e| e.as_str() == "Stack successfully destroyed")
        .count();
    assert_eq!(destroyed, 1);
}

#[tokio::test]
async fn test_best_effort_teardown_attempts_every_destroy() {
    let config = sample_config().with_teardown_failure_mode(FailureMode::BestEffort);
    let harness = TestPipeline::new(config)
        .with_engine(RecordingEngine::new().failing(EngineOp::Destroy, "data"));

    let err = harness.run(RunMode::Destroy).await.unwrap_err();

    assert_eq!(err.stack(), Some("dirien/data/dev"));
    assert_eq!(
        harness.engine.projects_for(EngineOp::Destroy),
        vec!["app", "data", "infra"]
    );
}

#[tokio::test]
async fn test_unset_variable_propagates_empty_secret() {
    let harness = TestPipeline::new(sample_config()).with_var("INFRA_TOKEN", "infra-secret");

    harness.run(RunMode::Apply).await.unwrap();

    let values: Vec<_> = harness
        .engine
        .calls()
        .into_iter()
        .filter(|c| c.op == EngineOp::SetSecret)
        .map(|c| (c.project, c.value.unwrap_or_default()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("infra".to_string(), "infra-secret".to_string()),
            ("data".to_string(), String::new()),
            ("app".to_string(), String::new()),
        ]
    );
}

#[tokio::test]
async fn test_console_output_order() {
    let harness = harness().with_engine(RecordingEngine::new().with_progress_lines(0));
    let config = PipelineConfig::new(vec![sample_config().stacks[0].clone()]);
    let harness = TestPipeline {
        config,
        ..harness
    };

    harness.run(RunMode::Destroy).await.unwrap();

    assert_eq!(
        harness.progress.entries(),
        vec![
            "dirien/infra/dev",
            "Starting refresh",
            "Refresh succeeded!",
            "Starting stack destroy",
            "Stack successfully destroyed",
        ]
    );
}
