//! In-memory provisioning engine that records every call.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::config::StackIdentity;
use crate::engine::{ProgressLine, ProgressStream, ProvisioningEngine, StackHandle, StackSource};
use crate::errors::EngineError;
use crate::secrets::SecretValue;

/// The engine operations a caller can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// `resolve_or_create`.
    Resolve,
    /// `set_secret_config`.
    SetSecret,
    /// `refresh`.
    Refresh,
    /// `apply`.
    Apply,
    /// `destroy`.
    Destroy,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "resolve"),
            Self::SetSecret => write!(f, "set_secret"),
            Self::Refresh => write!(f, "refresh"),
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    /// The operation.
    pub op: EngineOp,
    /// Project segment of the stack identity.
    pub project: String,
    /// Config key for `SetSecret` calls.
    pub key: Option<String>,
    /// Exposed secret value for `SetSecret` calls.
    pub value: Option<String>,
}

impl EngineCall {
    fn new(op: EngineOp, project: &str) -> Self {
        Self {
            op,
            project: project.to_string(),
            key: None,
            value: None,
        }
    }

    /// Renders as `op(project)`, e.g. `refresh(app)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}({})", self.op, self.project)
    }
}

/// A provisioning engine that succeeds unless told otherwise.
///
/// Every call is recorded in order. Operations on selected projects can be
/// made to fail, and every streamed operation emits a configurable number of
/// progress lines first.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    failures: Mutex<HashSet<(EngineOp, String)>>,
    progress_lines: usize,
}

impl RecordingEngine {
    /// Creates an engine where every operation succeeds with one progress line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            progress_lines: 1,
            ..Self::default()
        }
    }

    /// Sets how many progress lines each streamed operation emits.
    #[must_use]
    pub fn with_progress_lines(mut self, lines: usize) -> Self {
        self.progress_lines = lines;
        self
    }

    /// Makes `op` fail for `project`.
    #[must_use]
    pub fn failing(self, op: EngineOp, project: impl Into<String>) -> Self {
        self.failures.lock().insert((op, project.into()));
        self
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Returns recorded calls as `op(project)` labels.
    #[must_use]
    pub fn call_labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(EngineCall::label).collect()
    }

    /// Returns the projects `op` was called on, in order.
    #[must_use]
    pub fn projects_for(&self, op: EngineOp) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.project.clone())
            .collect()
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        let fails = self
            .failures
            .lock()
            .contains(&(call.op, call.project.clone()));
        let label = call.label();
        self.calls.lock().push(call);

        if fails {
            Err(EngineError::rejected(format!("{label} failed")))
        } else {
            Ok(())
        }
    }

    fn operation(&self, op: EngineOp, handle: &StackHandle) -> ProgressStream {
        let outcome = self.record(EngineCall::new(op, handle.project()));
        let mut items: Vec<Result<ProgressLine, EngineError>> = (0..self.progress_lines)
            .map(|i| Ok(ProgressLine::stdout(format!("{op} {} [{}]", handle.name(), i + 1))))
            .collect();
        if let Err(err) = outcome {
            items.push(Err(err));
        }
        stream::iter(items).boxed()
    }
}

#[async_trait]
impl ProvisioningEngine for RecordingEngine {
    async fn resolve_or_create(
        &self,
        identity: &StackIdentity,
        source: &StackSource,
    ) -> Result<StackHandle, EngineError> {
        self.record(EngineCall::new(EngineOp::Resolve, &identity.project))?;
        let workspace = PathBuf::from("/memory").join(&identity.project).join(&source.subpath);
        Ok(StackHandle::new(identity.clone(), workspace))
    }

    async fn set_secret_config(
        &self,
        handle: &StackHandle,
        key: &str,
        value: &SecretValue,
    ) -> Result<(), EngineError> {
        let mut call = EngineCall::new(EngineOp::SetSecret, handle.project());
        call.key = Some(key.to_string());
        call.value = Some(value.expose_secret().to_string());
        self.record(call)
    }

    fn refresh(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(EngineOp::Refresh, handle)
    }

    fn apply(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(EngineOp::Apply, handle)
    }

    fn destroy(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(EngineOp::Destroy, handle)
    }
}
