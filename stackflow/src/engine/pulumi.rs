//! Provisioning engine backed by the `pulumi` and `git` executables.

use super::{EngineCommand, ProgressStream, ProvisioningEngine, StackHandle, StackSource};
use crate::config::{EngineSettings, StackIdentity};
use crate::errors::EngineError;
use crate::secrets::SecretValue;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Drives stacks through the Pulumi CLI.
///
/// Each stack's repository is cloned into its own directory under
/// [`EngineSettings::work_dir`]; every subsequent command runs inside the
/// program subdirectory of that checkout.
#[derive(Debug, Clone)]
pub struct PulumiCliEngine {
    settings: EngineSettings,
}

impl PulumiCliEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Directory a stack's repository is cloned into.
    ///
    /// Distinct identities always map to distinct directories.
    #[must_use]
    pub fn checkout_dir(&self, identity: &StackIdentity) -> PathBuf {
        let dir_name = format!(
            "{}__{}__{}",
            encode_segment(&identity.owner),
            encode_segment(&identity.project),
            encode_segment(&identity.environment)
        );
        self.settings.work_dir.join(dir_name)
    }

    fn git(&self) -> EngineCommand {
        EngineCommand::new(&self.settings.git_bin)
    }

    fn pulumi(&self, handle: &StackHandle, subcommand: &[&str]) -> EngineCommand {
        EngineCommand::new(&self.settings.pulumi_bin)
            .args(subcommand.iter().copied())
            .args(["--stack".to_string(), handle.name()])
            .arg("--non-interactive")
            .current_dir(handle.workspace())
    }

    fn operation(&self, handle: &StackHandle, operation: &str) -> ProgressStream {
        self.pulumi(handle, &[operation, "--yes", "--skip-preview"])
            .stream()
    }

    async fn checkout(&self, identity: &StackIdentity, source: &StackSource) -> Result<PathBuf, EngineError> {
        let checkout = self.checkout_dir(identity);

        if tokio::fs::try_exists(&checkout).await? {
            debug!(path = %checkout.display(), "Removing stale checkout");
            tokio::fs::remove_dir_all(&checkout).await?;
        }
        tokio::fs::create_dir_all(&self.settings.work_dir).await?;

        let checkout_str = checkout.to_string_lossy().into_owned();
        self.git()
            .args(["clone", "--quiet", source.url.as_str(), checkout_str.as_str()])
            .output()
            .await?;
        if !is_dir(&checkout).await {
            return Err(EngineError::SourceUnavailable(format!(
                "cloning {} produced no checkout",
                source.url
            )));
        }

        self.git()
            .args(["checkout", "--quiet", source.branch.as_str()])
            .current_dir(&checkout)
            .output()
            .await?;

        let program_dir = checkout.join(&source.subpath);
        if !is_dir(&program_dir).await {
            return Err(EngineError::SourceUnavailable(format!(
                "'{}' does not exist in {} at {}",
                source.subpath, source.url, source.branch
            )));
        }
        Ok(program_dir)
    }
}

impl Default for PulumiCliEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[async_trait]
impl ProvisioningEngine for PulumiCliEngine {
    async fn resolve_or_create(
        &self,
        identity: &StackIdentity,
        source: &StackSource,
    ) -> Result<StackHandle, EngineError> {
        let program_dir = self.checkout(identity, source).await?;
        let handle = StackHandle::new(identity.clone(), program_dir);

        self.pulumi(&handle, &["stack", "select", "--create"])
            .output()
            .await?;

        info!(stack = %identity, workspace = %handle.workspace().display(), "Stack selected");
        Ok(handle)
    }

    async fn set_secret_config(
        &self,
        handle: &StackHandle,
        key: &str,
        value: &SecretValue,
    ) -> Result<(), EngineError> {
        self.pulumi(handle, &["config", "set", "--secret", key])
            .stdin_secret(value.clone())
            .output()
            .await?;
        Ok(())
    }

    fn refresh(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(handle, "refresh")
    }

    fn apply(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(handle, "up")
    }

    fn destroy(&self, handle: &StackHandle) -> ProgressStream {
        self.operation(handle, "destroy")
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Escapes every byte outside `[A-Za-z0-9.-]` as `_xx`, so `__` only ever
/// appears as the segment separator.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{byte:02x}"));
        }
    }
    encoded
}
