//! Build orchestration: clean -> build-for-testing -> test -> archive -> export -> upload.
//!
//! Each public operation runs one phase end to end:
//! 1. look up what it needs from [`SettingsProvider`]
//! 2. resolve the configured toolchain (if any) into `DEVELOPER_DIR`
//! 3. clear stale artifacts through the deletion safety gate
//! 4. stream the phase command, teeing output into its report log
//!
//! In dry-run mode commands are described instead of run, directories are not
//! created and no files are written, but the safety gate still applies so a
//! rehearsal surfaces the same refusals a real run would.

pub mod executor;
pub mod export_options;
pub mod naming;
pub mod state;

pub use executor::{GENERIC_IOS_DESTINATION, UPLOAD_PASSWORD_ENV};
pub use export_options::ExportOptions;
pub use state::BuildPhase;

use crate::config::{ReleaseEnvironment, SettingsProvider};
use crate::error::{OrchestratorError, Result};
use crate::models::{CommandResult, EnvironmentOverrides, ReportArtifactPaths};
use crate::system::paths::SafetyCheckedPath;
use crate::system::{shell_quote, ConsoleSink, EnvProvider, OutputSink, ProcessRunner, ShellCommand};
use crate::toolchain::ToolchainResolver;
use executor::PhaseLogSink;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sequences toolchain phases for one project.
#[derive(Clone)]
pub struct BuildOrchestrator {
    runner: ProcessRunner,
    settings: Arc<dyn SettingsProvider>,
    env: Arc<dyn EnvProvider>,
    resolver: ToolchainResolver,
    /// Where streamed output is echoed besides the phase log
    console: Arc<dyn OutputSink>,
}

impl BuildOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    /// * `runner` - Executes (or simulates) every command
    /// * `settings` - Directories, tools and release environments
    /// * `env` - Source of secrets such as the upload password
    pub fn new(
        runner: ProcessRunner,
        settings: Arc<dyn SettingsProvider>,
        env: Arc<dyn EnvProvider>,
    ) -> Self {
        let resolver = ToolchainResolver::new(runner.clone(), settings.discovery().clone());
        BuildOrchestrator {
            runner,
            settings,
            env,
            resolver,
            console: Arc::new(ConsoleSink),
        }
    }

    /// Replace the console echo of streamed output.
    pub fn with_console_sink(mut self, console: Arc<dyn OutputSink>) -> Self {
        self.console = console;
        self
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn resolver(&self) -> &ToolchainResolver {
        &self.resolver
    }

    /// Build the scheme's test bundles, optionally cleaning first.
    ///
    /// # Returns
    /// Log and result bundle paths of the build-for-testing phase.
    pub async fn build_for_testing(
        &self,
        scheme: &str,
        clean: bool,
        destination: &str,
    ) -> Result<ReportArtifactPaths> {
        self.ensure_directories()?;
        let environment = self.toolchain_environment().await?;
        let target = self.settings.build_target();
        let tool = &self.settings.tools().xcodebuild;

        if clean {
            let artifacts = self.destination_artifacts(BuildPhase::Clean, scheme, destination);
            let command = executor::clean_command(tool, target.as_ref(), scheme, destination);
            self.run_phase(BuildPhase::Clean, command, &artifacts.log_path, &environment)
                .await?;
        }

        let artifacts = self.destination_artifacts(BuildPhase::BuildForTesting, scheme, destination);
        self.remove_path(&artifacts.result_bundle_path).await?;
        let command = executor::build_for_testing_command(
            tool,
            target.as_ref(),
            scheme,
            destination,
            &artifacts.result_bundle_path,
        );
        self.run_phase(BuildPhase::BuildForTesting, command, &artifacts.log_path, &environment)
            .await?;
        Ok(artifacts)
    }

    /// Run previously built tests without rebuilding.
    pub async fn run_tests(&self, scheme: &str, destination: &str) -> Result<ReportArtifactPaths> {
        self.ensure_directories()?;
        let environment = self.toolchain_environment().await?;
        let target = self.settings.build_target();

        let artifacts = self.destination_artifacts(BuildPhase::Test, scheme, destination);
        self.remove_path(&artifacts.result_bundle_path).await?;
        let command = executor::test_command(
            &self.settings.tools().xcodebuild,
            target.as_ref(),
            scheme,
            destination,
            &artifacts.result_bundle_path,
        );
        self.run_phase(BuildPhase::Test, command, &artifacts.log_path, &environment)
            .await?;
        Ok(artifacts)
    }

    /// Clean and archive the release environment's scheme.
    ///
    /// # Returns
    /// Path of the `.xcarchive`.
    pub async fn archive(&self, environment_name: &str) -> Result<PathBuf> {
        let release = self.release_environment(environment_name)?;
        self.ensure_directories()?;
        let environment = self.toolchain_environment().await?;
        let build_dir = self.settings.build_dir();

        let archive_path = naming::archive_path(&build_dir, &release.output_name);
        self.remove_path(&archive_path).await?;

        let destination = release
            .destination
            .as_deref()
            .unwrap_or(GENERIC_IOS_DESTINATION);
        let command = executor::archive_command(
            &self.settings.tools().xcodebuild,
            self.settings.build_target().as_ref(),
            &release.scheme,
            &release.configuration,
            destination,
            &archive_path,
        );
        let log_path = self.release_log_path(BuildPhase::Archive, release, environment_name);
        self.run_phase(BuildPhase::Archive, command, &log_path, &environment)
            .await?;
        Ok(archive_path)
    }

    /// Export the archive into a distributable package.
    ///
    /// The export directory passes the safety gate and is removed before the
    /// export options are written; a refusal leaves the filesystem untouched.
    ///
    /// # Returns
    /// The export directory.
    pub async fn generate_ipa(&self, environment_name: &str) -> Result<PathBuf> {
        let release = self.release_environment(environment_name)?;
        let build_dir = self.settings.build_dir();
        let export_dir = naming::export_dir(&build_dir, &release.output_name);
        let checked = self.check_deletable(&export_dir)?;

        self.ensure_directories()?;
        let environment = self.toolchain_environment().await?;
        self.delete_checked(&checked).await?;

        let options_path = naming::export_options_path(&build_dir, &release.output_name);
        let options = ExportOptions::from_environment(release);
        if self.runner.is_dry_run() {
            println!(
                "[DRY RUN] Would write export options ({}) to: {}",
                options.method,
                options_path.display()
            );
        } else {
            options.write_to(&options_path)?;
            log::info!(
                "[Build] [EXPORT] Wrote export options to {}",
                options_path.display()
            );
        }

        let archive_path = naming::archive_path(&build_dir, &release.output_name);
        let command = executor::export_command(
            &self.settings.tools().xcodebuild,
            &archive_path,
            &export_dir,
            &options_path,
        );
        let log_path = self.release_log_path(BuildPhase::Export, release, environment_name);
        self.run_phase(BuildPhase::Export, command, &log_path, &environment)
            .await?;
        Ok(export_dir)
    }

    /// Upload the exported package.
    ///
    /// The password is read from [`UPLOAD_PASSWORD_ENV`] through the
    /// environment provider and handed to the child only as an environment
    /// variable. Without it altool falls back to its own keychain lookup.
    ///
    /// # Returns
    /// The uploaded package path.
    pub async fn upload(&self, environment_name: &str) -> Result<PathBuf> {
        let release = self.release_environment(environment_name)?;
        let export_dir = naming::export_dir(&self.settings.build_dir(), &release.output_name);

        let package = match naming::locate_package(&export_dir, &release.output_name) {
            Some(package) => package,
            // Nothing was exported during a rehearsal; describe the expected path
            None if self.runner.is_dry_run() => {
                naming::expected_package_path(&export_dir, &release.output_name)
            }
            None => return Err(OrchestratorError::PackageNotFound(export_dir)),
        };

        self.ensure_directories()?;
        let mut environment = self.toolchain_environment().await?;
        let password = self
            .env
            .var(UPLOAD_PASSWORD_ENV)
            .filter(|value| !value.is_empty());
        let with_password = password.is_some();
        if let Some(password) = password {
            environment.insert(UPLOAD_PASSWORD_ENV.to_string(), password);
        } else {
            log::warn!(
                "[Build] [UPLOAD] {} is not set; relying on altool keychain lookup",
                UPLOAD_PASSWORD_ENV
            );
        }

        let command = executor::upload_command(
            &self.settings.tools().xcrun,
            &package,
            release.upload_account.as_deref(),
            with_password,
        );
        let log_path = self.release_log_path(BuildPhase::Upload, release, environment_name);
        self.run_phase(BuildPhase::Upload, command, &log_path, &environment)
            .await?;
        Ok(package)
    }

    /// Remove the build and reports directories.
    ///
    /// Both are checked before either is deleted.
    pub async fn clean(&self) -> Result<()> {
        let build_dir = self.check_deletable(&self.settings.build_dir())?;
        let reports_dir = self.check_deletable(&self.settings.reports_dir())?;

        for checked in [build_dir, reports_dir] {
            self.delete_checked(&checked).await?;
        }
        log::info!("[Build] [CLEAN] Build outputs removed");
        Ok(())
    }

    fn release_environment(&self, name: &str) -> Result<&ReleaseEnvironment> {
        self.settings
            .release_environment(name)
            .ok_or_else(|| OrchestratorError::EnvironmentNotFound(name.to_string()))
    }

    fn destination_artifacts(
        &self,
        phase: BuildPhase,
        scheme: &str,
        destination: &str,
    ) -> ReportArtifactPaths {
        let report = naming::destination_report_name(phase, scheme, destination);
        naming::artifact_paths(&report, &self.settings.build_dir(), &self.settings.reports_dir())
    }

    fn release_log_path(
        &self,
        phase: BuildPhase,
        release: &ReleaseEnvironment,
        environment_name: &str,
    ) -> PathBuf {
        let report = naming::report_name(phase, &release.scheme, environment_name);
        naming::artifact_paths(&report, &self.settings.build_dir(), &self.settings.reports_dir())
            .log_path
    }

    /// Create the build and reports directories. Skipped in dry-run mode.
    fn ensure_directories(&self) -> Result<()> {
        for dir in [self.settings.build_dir(), self.settings.reports_dir()] {
            if self.runner.is_dry_run() {
                log::debug!("[Build] [DRY-RUN] Would create {}", dir.display());
                continue;
            }
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// `DEVELOPER_DIR` for the configured toolchain version, or nothing
    /// when no version is pinned.
    async fn toolchain_environment(&self) -> Result<EnvironmentOverrides> {
        let mut environment = EnvironmentOverrides::new();
        if let Some(version) = self.settings.toolchain_version() {
            let toolchain = self.resolver.resolve(version).await?;
            environment.insert(
                "DEVELOPER_DIR".to_string(),
                toolchain.developer_dir().display().to_string(),
            );
        }
        Ok(environment)
    }

    fn check_deletable(&self, path: &Path) -> Result<SafetyCheckedPath> {
        SafetyCheckedPath::from_path(path).map_err(|reason| {
            log::warn!(
                "[Build] [SAFETY] Refusing to delete {}: {}",
                path.display(),
                reason
            );
            OrchestratorError::UnsafePathDeletion {
                path: path.display().to_string(),
                reason: reason.to_string(),
            }
        })
    }

    /// Gate `path`, then delete it recursively if present.
    async fn remove_path(&self, path: &Path) -> Result<()> {
        let checked = self.check_deletable(path)?;
        self.delete_checked(&checked).await
    }

    async fn delete_checked(&self, checked: &SafetyCheckedPath) -> Result<()> {
        let path = checked.as_path();
        if !self.runner.is_dry_run() && fs::symlink_metadata(path).is_err() {
            log::debug!("[Build] [CLEAN] Nothing to remove at {}", path.display());
            return Ok(());
        }
        let command = format!("rm -rf {}", shell_quote(&path.to_string_lossy()));
        self.runner
            .execute_or_throw(command, None, &EnvironmentOverrides::new())
            .await?;
        log::info!("[Build] [CLEAN] Removed {}", path.display());
        Ok(())
    }

    async fn run_phase(
        &self,
        phase: BuildPhase,
        command: ShellCommand,
        log_path: &Path,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult> {
        log::info!("[Build] [PHASE] Starting {}", phase);
        let sink: Arc<dyn OutputSink> = if self.runner.is_dry_run() {
            Arc::clone(&self.console)
        } else {
            Arc::new(PhaseLogSink::create(log_path, Arc::clone(&self.console))?)
        };

        let outcome = self
            .runner
            .execute_streaming_to(
                command,
                Some(self.settings.project_root()),
                environment,
                sink,
            )
            .await;

        match outcome {
            Ok(result) => {
                log::info!("[Build] [PHASE] Completed {}", phase);
                Ok(result)
            }
            Err(e) => {
                log::error!(
                    "[Build] [PHASE] {} failed (log: {}): {}",
                    phase,
                    log_path.display(),
                    e
                );
                Err(e.into())
            }
        }
    }
}
