//! Single-stack lifecycle: resolve, configure secrets, refresh, apply.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{MissingSecretPolicy, PipelineConfig, StackDescriptor, StackIdentity};
use crate::context::RunContext;
use crate::engine::{ProgressStream, ProvisioningEngine, StackHandle, StackSource};
use crate::errors::{EngineError, OrchestratorError};
use crate::events::PipelineEvent;
use crate::observability::SpanTimer;
use crate::progress::forward_progress;
use crate::secrets::{SecretSource, SecretValue};

/// Drives one stack through its lifecycle.
///
/// The pipeline controller depends on this trait rather than on a
/// [`ProvisioningEngine`] directly, so whole runs can be tested against
/// fake runners.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Resolves, configures and refreshes the stack, then applies it unless
    /// the descriptor is in destroy mode.
    async fn run_stage(&self, descriptor: &StackDescriptor) -> Result<StackHandle, OrchestratorError>;

    /// Destroys every resource of a previously resolved stack.
    async fn destroy_stage(&self, handle: &StackHandle) -> Result<(), OrchestratorError>;
}

/// [`StageRunner`] backed by a [`ProvisioningEngine`].
pub struct EngineStageRunner {
    engine: Arc<dyn ProvisioningEngine>,
    secrets: Arc<dyn SecretSource>,
    owner: String,
    environment: String,
    missing_secret_policy: MissingSecretPolicy,
    context: RunContext,
}

impl EngineStageRunner {
    /// Creates a runner using the owner, environment and secret policy of `config`.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        engine: Arc<dyn ProvisioningEngine>,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            engine,
            secrets,
            owner: config.owner.clone(),
            environment: config.environment.clone(),
            missing_secret_policy: config.missing_secret_policy,
            context: RunContext::new(),
        }
    }

    /// Sets the run context.
    #[must_use]
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the run context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn identity(&self, descriptor: &StackDescriptor) -> StackIdentity {
        StackIdentity::new(&self.owner, &descriptor.name, &self.environment)
    }

    /// Reads every bound variable before the engine is touched.
    fn collect_secrets(
        &self,
        stack: &str,
        descriptor: &StackDescriptor,
    ) -> Result<Vec<(String, SecretValue)>, OrchestratorError> {
        let mut values = Vec::with_capacity(descriptor.secret_bindings.len());
        for binding in &descriptor.secret_bindings {
            let value = match self.secrets.lookup(&binding.env_var) {
                Some(value) => value,
                None => match self.missing_secret_policy {
                    MissingSecretPolicy::Reject => {
                        return Err(OrchestratorError::MissingSecret {
                            stack: stack.to_string(),
                            key: binding.key.clone(),
                            variable: binding.env_var.clone(),
                        });
                    }
                    MissingSecretPolicy::PropagateEmpty => {
                        warn!(
                            stack,
                            key = %binding.key,
                            variable = %binding.env_var,
                            "secret variable unset, using empty value"
                        );
                        SecretValue::empty()
                    }
                },
            };
            values.push((binding.key.clone(), value));
        }
        Ok(values)
    }

    /// Runs one streamed operation, bracketed by status messages and events.
    async fn stream_operation(
        &self,
        stack: &str,
        operation: &str,
        messages: (&str, &str),
        stream: ProgressStream,
    ) -> Result<(), EngineError> {
        let (starting, succeeded) = messages;
        let run_id = self.context.run_id();
        let progress = self.context.progress();

        progress.status(starting);
        self.context
            .events()
            .emit(PipelineEvent::stack(&format!("stack.{operation}.started"), run_id, stack))
            .await;

        let timer = SpanTimer::start(operation);
        let lines = forward_progress(stream, progress).await?;
        let duration_ms = timer.finish();

        info!(stack, operation, lines, duration_ms, "operation completed");
        self.context
            .events()
            .emit(PipelineEvent::stack_completed(
                &format!("stack.{operation}.completed"),
                run_id,
                stack,
                duration_ms,
            ))
            .await;
        progress.status(succeeded);
        Ok(())
    }

    async fn run_stage_inner(
        &self,
        stack: &str,
        identity: &StackIdentity,
        descriptor: &StackDescriptor,
    ) -> Result<StackHandle, OrchestratorError> {
        let run_id = self.context.run_id();
        let secrets = self.collect_secrets(stack, descriptor)?;

        let handle = self
            .engine
            .resolve_or_create(identity, &StackSource::from(descriptor))
            .await
            .map_err(|source| OrchestratorError::SourceResolution {
                stack: stack.to_string(),
                source,
            })?;
        info!(stack, workspace = %handle.workspace().display(), "stack resolved");
        self.context
            .events()
            .emit(PipelineEvent::stack("stack.resolved", run_id, stack))
            .await;

        for (key, value) in &secrets {
            self.engine
                .set_secret_config(&handle, key, value)
                .await
                .map_err(|source| OrchestratorError::SecretConfig {
                    stack: stack.to_string(),
                    key: key.clone(),
                    source,
                })?;
            self.context
                .events()
                .emit(
                    PipelineEvent::stack("stack.secret_set", run_id, stack)
                        .add_data("key", serde_json::json!(key)),
                )
                .await;
        }

        self.stream_operation(
            stack,
            "refresh",
            ("Starting refresh", "Refresh succeeded!"),
            self.engine.refresh(&handle),
        )
        .await
        .map_err(|source| OrchestratorError::Refresh {
            stack: stack.to_string(),
            source,
        })?;

        if descriptor.destroy {
            return Ok(handle);
        }

        self.stream_operation(
            stack,
            "apply",
            ("Starting update", "Update succeeded!"),
            self.engine.apply(&handle),
        )
        .await
        .map_err(|source| OrchestratorError::Apply {
            stack: stack.to_string(),
            source,
        })?;

        Ok(handle)
    }

    async fn report_failure(&self, stack: &str, error: &OrchestratorError) {
        warn!(stack, kind = error.kind(), error = %error, "stack failed");
        self.context
            .events()
            .emit(PipelineEvent::stack_failed(
                self.context.run_id(),
                stack,
                error.kind(),
                &error.to_string(),
            ))
            .await;
    }
}

#[async_trait]
impl StageRunner for EngineStageRunner {
    async fn run_stage(&self, descriptor: &StackDescriptor) -> Result<StackHandle, OrchestratorError> {
        let identity = self.identity(descriptor);
        let stack = identity.fully_qualified();
        self.context.progress().status(&stack);

        let span = info_span!("stage", stack = %stack, destroy = descriptor.destroy);
        let result = self
            .run_stage_inner(&stack, &identity, descriptor)
            .instrument(span)
            .await;

        if let Err(error) = &result {
            self.report_failure(&stack, error).await;
        }
        result
    }

    async fn destroy_stage(&self, handle: &StackHandle) -> Result<(), OrchestratorError> {
        let stack = handle.name();
        let span = info_span!("destroy", stack = %stack);

        let result = self
            .stream_operation(
                &stack,
                "destroy",
                ("Starting stack destroy", "Stack successfully destroyed"),
                self.engine.destroy(handle),
            )
            .instrument(span)
            .await
            .map_err(|source| OrchestratorError::Destroy {
                stack: stack.clone(),
                source,
            });

        if let Err(error) = &result {
            self.report_failure(&stack, error).await;
        }
        result
    }
}

impl std::fmt::Debug for EngineStageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineStageRunner")
            .field("owner", &self.owner)
            .field("environment", &self.environment)
            .field("missing_secret_policy", &self.missing_secret_policy)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
