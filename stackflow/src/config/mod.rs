//! Pipeline configuration.
//!
//! The stacks a run drives are described by an ordered [`PipelineConfig`].
//! Order is dependency order: every stack may consume outputs published by
//! the stacks before it, so teardown walks the list backwards.

mod identity;
mod settings;

pub use identity::StackIdentity;
pub use settings::{EngineSettings, LogFormat};

use crate::errors::ConfigError;
use crate::pipeline::FailureMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Owner namespace the default stacks live under.
pub const DEFAULT_OWNER: &str = "dirien";

/// Environment label of the default stacks.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Repository holding the default stacks' programs.
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/dirien/pulumi-aiven-openfaas";

/// Branch the default stacks' programs are taken from.
pub const DEFAULT_SOURCE_BRANCH: &str = "refs/remotes/origin/automation";

/// Whether a run reconciles stacks or tears them down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Refresh then apply every stack.
    #[default]
    Apply,
    /// Refresh every stack, then destroy them in reverse order.
    Destroy,
}

impl RunMode {
    /// Parses the mode from command-line arguments (program name excluded).
    ///
    /// Only the first argument is inspected; it selects [`RunMode::Destroy`]
    /// when it is exactly `destroy`.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match args.into_iter().next() {
            Some(first) if first.as_ref() == "destroy" => Self::Destroy,
            _ => Self::Apply,
        }
    }

    /// Returns true for teardown runs.
    #[must_use]
    pub fn is_destroy(self) -> bool {
        matches!(self, Self::Destroy)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// What to do when a secret binding's environment variable is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSecretPolicy {
    /// Set the key to an empty secret and carry on.
    #[default]
    PropagateEmpty,
    /// Fail the stack before any configuration is written.
    Reject,
}

/// Binds a stack configuration key to the environment variable holding its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretBinding {
    /// Configuration key understood by the stack's program (e.g. `linode:token`).
    pub key: String,
    /// Environment variable read at stage-run time.
    pub env_var: String,
}

impl SecretBinding {
    /// Creates a new secret binding.
    #[must_use]
    pub fn new(key: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            env_var: env_var.into(),
        }
    }
}

/// Describes one stack of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Project name; becomes the middle segment of the stack identity.
    pub name: String,
    /// Git URL of the repository holding the stack's program.
    pub source_url: String,
    /// Branch or ref to check out.
    pub branch: String,
    /// Directory within the repository containing the program.
    pub source_subpath: String,
    /// Stop after refresh instead of applying.
    #[serde(default)]
    pub destroy: bool,
    /// Secret configuration pushed before refresh, in order.
    #[serde(default)]
    pub secret_bindings: Vec<SecretBinding>,
}

impl StackDescriptor {
    /// Creates a new descriptor with no secret bindings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        branch: impl Into<String>,
        source_subpath: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            branch: branch.into(),
            source_subpath: source_subpath.into(),
            destroy: false,
            secret_bindings: Vec::new(),
        }
    }

    /// Adds a secret binding.
    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, env_var: impl Into<String>) -> Self {
        self.secret_bindings.push(SecretBinding::new(key, env_var));
        self
    }

    /// Returns a copy with the destroy flag set.
    #[must_use]
    pub fn with_destroy(&self, destroy: bool) -> Self {
        Self {
            destroy,
            ..self.clone()
        }
    }
}

/// Ordered configuration of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Owner namespace for every stack identity.
    pub owner: String,
    /// Environment label for every stack identity.
    pub environment: String,
    /// Stacks in dependency order.
    pub stacks: Vec<StackDescriptor>,
    /// Handling of unset secret variables.
    #[serde(default)]
    pub missing_secret_policy: MissingSecretPolicy,
    /// Handling of destroy failures during teardown.
    #[serde(default)]
    pub teardown_failure_mode: FailureMode,
}

impl Default for PipelineConfig {
    /// The cluster, data-platform and application stacks.
    fn default() -> Self {
        Self::new(vec![
            StackDescriptor::new(
                "00-infrastructure--aa",
                DEFAULT_SOURCE_URL,
                DEFAULT_SOURCE_BRANCH,
                "00-infrastructure",
            )
            .with_secret("linode:token", "LINODE_TOKEN"),
            StackDescriptor::new(
                "01-aiven-aa",
                DEFAULT_SOURCE_URL,
                DEFAULT_SOURCE_BRANCH,
                "01-aiven",
            )
            .with_secret("aiven:apiToken", "AIVEN_TOKEN"),
            StackDescriptor::new(
                "02-openfaas-aa",
                DEFAULT_SOURCE_URL,
                DEFAULT_SOURCE_BRANCH,
                "02-openfaas",
            )
            .with_secret("openfaas", "LICENSE"),
        ])
    }
}

impl PipelineConfig {
    /// Creates a configuration under the default owner and environment.
    #[must_use]
    pub fn new(stacks: Vec<StackDescriptor>) -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            stacks,
            missing_secret_policy: MissingSecretPolicy::default(),
            teardown_failure_mode: FailureMode::default(),
        }
    }

    /// Sets the owner namespace.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Sets the environment label.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Sets the missing secret policy.
    #[must_use]
    pub fn with_missing_secret_policy(mut self, policy: MissingSecretPolicy) -> Self {
        self.missing_secret_policy = policy;
        self
    }

    /// Sets the teardown failure mode.
    #[must_use]
    pub fn with_teardown_failure_mode(mut self, mode: FailureMode) -> Self {
        self.teardown_failure_mode = mode;
        self
    }

    /// Returns the identity of a stack under this configuration.
    #[must_use]
    pub fn identity_for(&self, descriptor: &StackDescriptor) -> StackIdentity {
        StackIdentity::new(&self.owner, &descriptor.name, &self.environment)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stacks, a name or source URL is
    /// blank, or two stacks share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stacks.is_empty() {
            return Err(ConfigError::new("pipeline has no stacks"));
        }
        if self.owner.trim().is_empty() || self.environment.trim().is_empty() {
            return Err(ConfigError::new(
                "owner and environment cannot be empty or whitespace-only",
            ));
        }

        let mut seen = HashSet::new();
        for stack in &self.stacks {
            if stack.name.trim().is_empty() {
                return Err(ConfigError::new(
                    "stack name cannot be empty or whitespace-only",
                ));
            }
            if stack.source_url.trim().is_empty() {
                return Err(ConfigError::new(format!(
                    "stack '{}' has no source URL",
                    stack.name
                ))
                .with_stacks(vec![stack.name.clone()]));
            }
            if !seen.insert(stack.name.as_str()) {
                return Err(ConfigError::new(format!(
                    "stack '{}' is declared more than once",
                    stack.name
                ))
                .with_stacks(vec![stack.name.clone()]));
            }
        }
        Ok(())
    }
}
