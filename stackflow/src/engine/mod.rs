//! Provisioning engine abstraction.
//!
//! The orchestrator never reconciles resources itself. It drives an engine
//! through the narrow [`ProvisioningEngine`] capability set: resolve a stack,
//! write secret config, and run refresh/apply/destroy while streaming the
//! engine's progress output.

mod command;
mod pulumi;

pub use command::EngineCommand;
pub use pulumi::PulumiCliEngine;

use crate::config::{StackDescriptor, StackIdentity};
use crate::errors::EngineError;
use crate::secrets::SecretValue;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Live progress output of a long-running engine operation.
///
/// The stream ends after the operation completes. A failed operation yields
/// an `Err` item as its last element.
pub type ProgressStream = BoxStream<'static, Result<ProgressLine, EngineError>>;

/// Which output channel a progress line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressChannel {
    /// Regular output.
    Stdout,
    /// Diagnostic output.
    Stderr,
}

/// One line of engine progress output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLine {
    /// Originating channel.
    pub channel: ProgressChannel,
    /// The line, without its terminator.
    pub text: String,
}

impl ProgressLine {
    /// Creates a stdout line.
    #[must_use]
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            channel: ProgressChannel::Stdout,
            text: text.into(),
        }
    }

    /// Creates a stderr line.
    #[must_use]
    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            channel: ProgressChannel::Stderr,
            text: text.into(),
        }
    }
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Where a stack's declarative program lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackSource {
    /// Git repository URL.
    pub url: String,
    /// Branch or ref.
    pub branch: String,
    /// Program directory within the repository.
    pub subpath: String,
}

impl StackSource {
    /// Creates a new stack source.
    #[must_use]
    pub fn new(url: impl Into<String>, branch: impl Into<String>, subpath: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            subpath: subpath.into(),
        }
    }
}

impl From<&StackDescriptor> for StackSource {
    fn from(descriptor: &StackDescriptor) -> Self {
        Self::new(
            &descriptor.source_url,
            &descriptor.branch,
            &descriptor.source_subpath,
        )
    }
}

/// Reference to a resolved deployment target.
///
/// The state lives in the engine; the handle only names it for the duration
/// of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackHandle {
    identity: StackIdentity,
    workspace: PathBuf,
}

impl StackHandle {
    /// Creates a handle for an identity whose program lives in `workspace`.
    #[must_use]
    pub fn new(identity: StackIdentity, workspace: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            workspace: workspace.into(),
        }
    }

    /// Returns the fully-qualified stack name.
    #[must_use]
    pub fn name(&self) -> String {
        self.identity.fully_qualified()
    }

    /// Returns the project segment of the identity.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.identity.project
    }

    /// Engine-private location of the stack's program.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

/// Capabilities the orchestrator needs from a provisioning engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Selects the stack, creating it first if it does not exist.
    async fn resolve_or_create(
        &self,
        identity: &StackIdentity,
        source: &StackSource,
    ) -> Result<StackHandle, EngineError>;

    /// Stores a secret configuration value on the stack.
    async fn set_secret_config(
        &self,
        handle: &StackHandle,
        key: &str,
        value: &SecretValue,
    ) -> Result<(), EngineError>;

    /// Reconciles recorded state with the live resources.
    fn refresh(&self, handle: &StackHandle) -> ProgressStream;

    /// Reconciles live resources with the declared program.
    fn apply(&self, handle: &StackHandle) -> ProgressStream;

    /// Removes every resource of the stack.
    fn destroy(&self, handle: &StackHandle) -> ProgressStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_source_from_descriptor() {
        let descriptor = StackDescriptor::new("01-aiven-aa", "https://example.com/repo", "main", "01-aiven");
        let source = StackSource::from(&descriptor);

        assert_eq!(source.url, "https://example.com/repo");
        assert_eq!(source.branch, "main");
        assert_eq!(source.subpath, "01-aiven");
    }

    #[test]
    fn test_handle_accessors() {
        let handle = StackHandle::new(StackIdentity::new("dirien", "app", "dev"), "/tmp/app");

        assert_eq!(handle.name(), "dirien/app/dev");
        assert_eq!(handle.project(), "app");
        assert_eq!(handle.workspace(), Path::new("/tmp/app"));
    }

    #[test]
    fn test_progress_line_display() {
        assert_eq!(ProgressLine::stdout("Updating (dev)").to_string(), "Updating (dev)");
        assert_eq!(ProgressLine::stderr("warning").channel, ProgressChannel::Stderr);
    }
}
