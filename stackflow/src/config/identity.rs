//! Fully-qualified stack identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a deployment target as `owner/project/environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackIdentity {
    /// Owner namespace (organization or user).
    pub owner: String,
    /// Project name.
    pub project: String,
    /// Environment label.
    pub environment: String,
}

impl StackIdentity {
    /// Creates a new stack identity.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        project: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            project: project.into(),
            environment: environment.into(),
        }
    }

    /// Returns the fully-qualified name.
    #[must_use]
    pub fn fully_qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.project, self.environment)
    }
}
