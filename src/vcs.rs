//! Git access built on [`ProcessRunner`].
//!
//! Queries run read-only so they answer truthfully during a dry run.
//! Mutations go through argument vectors, never shell strings, so commit
//! messages and tag names cannot be reinterpreted by a shell.

use crate::error::CommandError;
use crate::models::{CommandResult, EnvironmentOverrides};
use crate::system::{ArgvCommand, ProcessRunner};
use std::path::{Path, PathBuf};

/// Git client bound to one working tree.
#[derive(Debug, Clone)]
pub struct GitClient {
    runner: ProcessRunner,
    git: String,
    repo_dir: PathBuf,
}

impl GitClient {
    /// # Arguments
    /// * `runner` - Runner whose dry-run mode applies to mutations
    /// * `git` - Git executable name or path
    /// * `repo_dir` - Directory every command runs in
    pub fn new(runner: ProcessRunner, git: impl Into<String>, repo_dir: impl Into<PathBuf>) -> Self {
        GitClient {
            runner,
            git: git.into(),
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn command(&self) -> ArgvCommand {
        ArgvCommand::new(self.git.as_str())
    }

    async fn query(&self, command: ArgvCommand) -> Option<String> {
        match self
            .runner
            .execute_args_read_only(&command, Some(&self.repo_dir), &EnvironmentOverrides::new())
            .await
        {
            Ok(result) if result.is_success() => Some(result.stdout.trim().to_string()),
            Ok(result) => {
                log::debug!(
                    "[Git] '{}' exited with {}",
                    result.original_command,
                    result.exit_code
                );
                None
            }
            Err(e) => {
                log::warn!("[Git] Could not run {}: {}", self.git, e);
                None
            }
        }
    }

    /// Name of the checked-out branch; `None` when detached, outside a
    /// repository, or when git is unavailable.
    pub async fn current_branch(&self) -> Option<String> {
        let branch = self
            .query(self.command().args(["rev-parse", "--abbrev-ref", "HEAD"]))
            .await?;
        if branch.is_empty() || branch == "HEAD" {
            None
        } else {
            Some(branch)
        }
    }

    pub async fn is_repository(&self) -> bool {
        self.query(self.command().args(["rev-parse", "--is-inside-work-tree"]))
            .await
            .map_or(false, |out| out == "true")
    }

    /// Stage `paths`.
    pub async fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<CommandResult, CommandError> {
        let command = self.command().args(["add", "--"]).args(
            paths
                .iter()
                .map(|p| p.as_ref().to_string_lossy().into_owned()),
        );
        self.mutate(command).await
    }

    /// Commit what is staged.
    pub async fn commit(&self, message: &str) -> Result<CommandResult, CommandError> {
        self.mutate(self.command().args(["commit", "-m", message]))
            .await
    }

    /// Create an annotated tag at `HEAD`.
    pub async fn create_tag(&self, name: &str, message: &str) -> Result<CommandResult, CommandError> {
        self.mutate(self.command().args(["tag", "-a", name, "-m", message]))
            .await
    }

    async fn mutate(&self, command: ArgvCommand) -> Result<CommandResult, CommandError> {
        log::info!("[Git] {}", command);
        self.runner
            .execute_args_or_throw(&command, Some(&self.repo_dir), &EnvironmentOverrides::new())
            .await
    }
}
