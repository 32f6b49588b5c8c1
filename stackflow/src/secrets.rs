//! Secret values and the environment they are read from.

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A secret configuration value.
///
/// The wrapped string is never rendered by `Debug`, `Display` or `Serialize`,
/// so it can be carried through logs and events without leaking.
#[derive(Clone)]
pub struct SecretValue(SecretString);

impl SecretValue {
    /// Creates a new secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Creates an empty secret.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    /// Exposes the secret value.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns true if the secret is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose_secret().is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***REDACTED***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***REDACTED***")
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Source of environment variable values for secret bindings.
pub trait SecretSource: Send + Sync {
    /// Looks up a variable, returning `None` when it is unset.
    fn lookup(&self, variable: &str) -> Option<SecretValue>;
}

/// Reads secrets from the process environment at lookup time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn lookup(&self, variable: &str) -> Option<SecretValue> {
        std::env::var(variable).ok().map(SecretValue::new)
    }
}

/// A fixed in-memory environment.
#[derive(Debug, Default)]
pub struct StaticEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl StaticEnv {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable.
    #[must_use]
    pub fn with_var(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a variable.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(name.into(), value.into());
    }
}

impl SecretSource for StaticEnv {
    fn lookup(&self, variable: &str) -> Option<SecretValue> {
        self.vars.read().get(variable).cloned().map(SecretValue::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_is_redacted() {
        let secret = SecretValue::new("hunter2");

        assert_eq!(format!("{secret}"), "***REDACTED***");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(serde_json::to_string(&secret).unwrap(), r#""***REDACTED***""#);
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_empty_secret() {
        assert!(SecretValue::empty().is_empty());
        assert!(!SecretValue::from("x").is_empty());
    }

    #[test]
    fn test_static_env_lookup() {
        let env = StaticEnv::new().with_var("LINODE_TOKEN", "abc");

        assert_eq!(env.lookup("LINODE_TOKEN").unwrap().expose_secret(), "abc");
        assert!(env.lookup("AIVEN_TOKEN").is_none());

        env.set("LINODE_TOKEN", "rotated");
        assert_eq!(env.lookup("LINODE_TOKEN").unwrap().expose_secret(), "rotated");
    }

    #[test]
    fn test_process_env_missing_variable() {
        assert!(ProcessEnv
            .lookup("STACKFLOW_TEST_VARIABLE_THAT_IS_NEVER_SET")
            .is_none());
    }
}
