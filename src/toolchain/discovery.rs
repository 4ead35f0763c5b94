//! Locating installed Xcode copies.
//!
//! The indexed lookup is tried first. When it fails or prints nothing the
//! applications directory is scanned instead. Every candidate's version is
//! read with the configured command; unreadable candidates are skipped.

use crate::config::DiscoverySettings;
use crate::error::ToolchainError;
use crate::models::{EnvironmentOverrides, ToolchainCandidate};
use crate::system::{shell_quote, ProcessRunner};
use std::fs;
use std::path::{Path, PathBuf};

/// Find every installed toolchain with a readable version.
///
/// Always runs for real, even in dry-run mode. Never fails; a broken lookup
/// yields fewer (or no) candidates.
pub async fn discover_toolchains(
    runner: &ProcessRunner,
    discovery: &DiscoverySettings,
) -> Vec<ToolchainCandidate> {
    let mut app_paths = indexed_app_paths(runner, &discovery.index_command).await;
    if app_paths.is_empty() {
        log::debug!(
            "[Toolchain] [DISCOVERY] Index lookup empty, scanning {}",
            discovery.applications_dir.display()
        );
        app_paths = scan_applications_dir(&discovery.applications_dir, &discovery.app_name_prefix);
    }

    let mut candidates = Vec::with_capacity(app_paths.len());
    for app in app_paths {
        match read_version(runner, &discovery.version_command, &app).await {
            Ok(version) => {
                log::debug!("[Toolchain] [DISCOVERY] {} -> {}", app.display(), version);
                candidates.push(ToolchainCandidate::new(app, version));
            }
            Err(e) => log::warn!("[Toolchain] [DISCOVERY] Skipping candidate: {}", e),
        }
    }
    candidates
}

async fn indexed_app_paths(runner: &ProcessRunner, index_command: &str) -> Vec<PathBuf> {
    if index_command.trim().is_empty() {
        return Vec::new();
    }
    match runner
        .execute_read_only(index_command, None, &EnvironmentOverrides::new())
        .await
    {
        Ok(result) if result.is_success() => result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect(),
        Ok(result) => {
            log::debug!(
                "[Toolchain] [DISCOVERY] Index lookup exited with {}",
                result.exit_code
            );
            Vec::new()
        }
        Err(e) => {
            log::warn!("[Toolchain] [DISCOVERY] Index lookup could not run: {}", e);
            Vec::new()
        }
    }
}

/// Entries of `dir` named `<prefix>*.app`, sorted by name.
pub fn scan_applications_dir(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!(
                "[Toolchain] [DISCOVERY] Cannot read {}: {}",
                dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut apps: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(prefix) && name.ends_with(".app"))
        })
        .collect();
    apps.sort();
    apps
}

/// Read the version of the toolchain installed at `app`.
///
/// `{app}` in `template` is replaced by the shell-quoted path.
///
/// # Errors
/// `ToolchainError::VersionFetchFailed` if the command cannot run, exits
/// non-zero, or prints nothing.
pub async fn read_version(
    runner: &ProcessRunner,
    template: &str,
    app: &Path,
) -> Result<String, ToolchainError> {
    let command = template.replace("{app}", &shell_quote(&app.to_string_lossy()));
    let failed = |reason: String| ToolchainError::VersionFetchFailed {
        path: app.to_path_buf(),
        reason,
    };

    let result = runner
        .execute_read_only(command, None, &EnvironmentOverrides::new())
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !result.is_success() {
        let stderr = result.stderr.trim();
        return Err(failed(if stderr.is_empty() {
            format!("exit code {}", result.exit_code)
        } else {
            stderr.to_string()
        }));
    }

    let version = result.stdout.trim();
    if version.is_empty() {
        return Err(failed("empty version output".to_string()));
    }
    Ok(version.to_string())
}
