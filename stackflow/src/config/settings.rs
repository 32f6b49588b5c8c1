//! Process-level settings read from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides the `pulumi` executable.
pub const PULUMI_BIN_VAR: &str = "STACKFLOW_PULUMI_BIN";
/// Overrides the `git` executable.
pub const GIT_BIN_VAR: &str = "STACKFLOW_GIT_BIN";
/// Overrides the directory stack sources are checked out into.
pub const WORK_DIR_VAR: &str = "STACKFLOW_WORK_DIR";
/// Selects the log output format.
pub const LOG_FORMAT_VAR: &str = "STACKFLOW_LOG_FORMAT";

/// Settings for the CLI-backed provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// The `pulumi` executable.
    pub pulumi_bin: String,
    /// The `git` executable.
    pub git_bin: String,
    /// Root directory for per-stack source checkouts.
    pub work_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pulumi_bin: "pulumi".to_string(),
            git_bin: "git".to_string(),
            work_dir: std::env::temp_dir().join("stackflow"),
        }
    }
}

impl EngineSettings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through a variable lookup function.
    ///
    /// Blank values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            pulumi_bin: get(PULUMI_BIN_VAR).unwrap_or(defaults.pulumi_bin),
            git_bin: get(GIT_BIN_VAR).unwrap_or(defaults.git_bin),
            work_dir: get(WORK_DIR_VAR).map_or(defaults.work_dir, PathBuf::from),
        }
    }
}

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per record.
    Json,
}

impl LogFormat {
    /// Reads the format from [`LOG_FORMAT_VAR`].
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Parses a format name; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}
