//! Toolchain discovery and version resolution.
//!
//! Nothing here is cached: every call rediscovers the installed copies so a
//! toolchain installed mid-session is picked up on the next phase.

pub mod discovery;
pub mod version;

use crate::config::DiscoverySettings;
use crate::error::ToolchainError;
use crate::models::ToolchainCandidate;
use crate::system::ProcessRunner;
use std::path::Path;

pub use version::{compare_versions, pessimistic_prefix, select_best_match};

/// Finds installed toolchains and picks the best match for a constraint.
#[derive(Debug, Clone)]
pub struct ToolchainResolver {
    runner: ProcessRunner,
    discovery: DiscoverySettings,
}

impl ToolchainResolver {
    pub fn new(runner: ProcessRunner, discovery: DiscoverySettings) -> Self {
        ToolchainResolver { runner, discovery }
    }

    /// Every installed toolchain with a readable version, highest first.
    pub async fn installed_toolchains(&self) -> Vec<ToolchainCandidate> {
        let mut candidates = discovery::discover_toolchains(&self.runner, &self.discovery).await;
        candidates.sort_by(|a, b| compare_versions(&b.version, &a.version));
        candidates
    }

    /// Resolve `target` against the installed toolchains.
    ///
    /// # Errors
    /// `ToolchainError::VersionNotFound` if no installed copy satisfies it.
    pub async fn resolve(&self, target: &str) -> Result<ToolchainCandidate, ToolchainError> {
        log::info!("[Toolchain] Resolving version constraint '{}'", target);
        let candidates = discovery::discover_toolchains(&self.runner, &self.discovery).await;
        let selected = select_best_match(target, &candidates)?;
        log::info!(
            "[Toolchain] Selected {} at {}",
            selected.version,
            selected.install_path.display()
        );
        Ok(selected)
    }

    /// True if some installed toolchain satisfies `target`.
    pub async fn toolchain_exists(&self, target: &str) -> bool {
        self.resolve(target).await.is_ok()
    }

    /// Read the version of a single installation.
    pub async fn read_version(&self, app: &Path) -> Result<String, ToolchainError> {
        discovery::read_version(&self.runner, &self.discovery.version_command, app).await
    }
}
