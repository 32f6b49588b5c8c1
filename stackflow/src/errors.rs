//! Error types for the stackflow orchestrator.
//!
//! Every failure surfaced by the provisioning engine is wrapped in an
//! [`OrchestratorError`] variant naming the step that failed and the
//! fully-qualified stack it failed on. Nothing is retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for orchestration runs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The stack's program source could not be fetched or the subpath is invalid.
    #[error("Failed to create or select stack '{stack}': {source}")]
    SourceResolution {
        /// Fully-qualified stack name.
        stack: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// Writing a secret configuration value failed.
    #[error("Failed to set secret config '{key}' on stack '{stack}': {source}")]
    SecretConfig {
        /// Fully-qualified stack name.
        stack: String,
        /// The configuration key.
        key: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// A secret binding's environment variable is unset (strict policy only).
    #[error("Secret '{key}' for stack '{stack}' requires environment variable '{variable}', which is not set")]
    MissingSecret {
        /// Fully-qualified stack name.
        stack: String,
        /// The configuration key.
        key: String,
        /// The environment variable that was expected.
        variable: String,
    },

    /// Refreshing the recorded state failed.
    #[error("Failed to refresh stack '{stack}': {source}")]
    Refresh {
        /// Fully-qualified stack name.
        stack: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// Applying the declared program failed.
    #[error("Failed to update stack '{stack}': {source}")]
    Apply {
        /// Fully-qualified stack name.
        stack: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// Destroying the stack's resources failed.
    #[error("Failed to delete stack '{stack}': {source}")]
    Destroy {
        /// Fully-qualified stack name.
        stack: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// The pipeline configuration is invalid.
    #[error("{0}")]
    InvalidConfig(#[from] ConfigError),
}

impl OrchestratorError {
    /// Returns the fully-qualified stack name the error relates to, if any.
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::SourceResolution { stack, .. }
            | Self::SecretConfig { stack, .. }
            | Self::MissingSecret { stack, .. }
            | Self::Refresh { stack, .. }
            | Self::Apply { stack, .. }
            | Self::Destroy { stack, .. } => Some(stack),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Returns a short machine-readable kind for events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceResolution { .. } => "source_resolution",
            Self::SecretConfig { .. } => "secret_config",
            Self::MissingSecret { .. } => "missing_secret",
            Self::Refresh { .. } => "refresh",
            Self::Apply { .. } => "apply",
            Self::Destroy { .. } => "destroy",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Errors reported by a provisioning engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The remote source or its subpath could not be used.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// An engine command exited unsuccessfully.
    #[error("`{command}` exited with {status}{}", detail_suffix(.detail))]
    CommandFailed {
        /// The command that was run (without secret values).
        command: String,
        /// Exit status description.
        status: String,
        /// Trailing diagnostic output, if any.
        detail: Option<String>,
    },

    /// The engine rejected the operation.
    #[error("{0}")]
    Rejected(String),

    /// IO error while talking to the engine.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl EngineError {
    /// Creates a command failure error.
    #[must_use]
    pub fn command_failed(
        command: impl Into<String>,
        status: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status: status.into(),
            detail,
        }
    }

    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Error raised when a pipeline configuration fails validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Invalid pipeline configuration: {message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The stacks involved in the error.
    pub stacks: Vec<String>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stacks: Vec::new(),
        }
    }

    /// Sets the stacks involved.
    #[must_use]
    pub fn with_stacks(mut self, stacks: Vec<String>) -> Self {
        self.stacks = stacks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_error_stack_and_kind() {
        let err = OrchestratorError::Refresh {
            stack: "dirien/infra/dev".to_string(),
            source: EngineError::rejected("backend unavailable"),
        };

        assert_eq!(err.stack(), Some("dirien/infra/dev"));
        assert_eq!(err.kind(), "refresh");
        assert_eq!(
            err.to_string(),
            "Failed to refresh stack 'dirien/infra/dev': backend unavailable"
        );
    }

    #[test]
    fn test_command_failed_display() {
        let err = EngineError::command_failed("pulumi up", "exit status: 255", Some("boom".into()));
        assert_eq!(err.to_string(), "`pulumi up` exited with exit status: 255: boom");

        let bare = EngineError::command_failed("pulumi up", "exit status: 1", None);
        assert_eq!(bare.to_string(), "`pulumi up` exited with exit status: 1");
    }

    #[test]
    fn test_config_error_into_orchestrator_error() {
        let err: OrchestratorError = ConfigError::new("no stacks")
            .with_stacks(vec!["a".to_string()])
            .into();

        assert!(err.stack().is_none());
        assert_eq!(err.kind(), "invalid_config");
        assert_eq!(err.to_string(), "Invalid pipeline configuration: no stacks");
    }

    #[test]
    fn test_missing_secret_message_names_variable() {
        let err = OrchestratorError::MissingSecret {
            stack: "dirien/app/dev".to_string(),
            key: "openfaas".to_string(),
            variable: "LICENSE".to_string(),
        };
        assert!(err.to_string().contains("LICENSE"));
    }
}
