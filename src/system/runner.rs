//! Process execution with dry-run simulation and live output streaming.
//!
//! Every interaction with the operating system goes through [`ProcessRunner`]
//! and comes back as a [`CommandResult`]. The runner's mode is fixed at
//! construction:
//! - **live**: commands are spawned and their output captured
//! - **dry-run**: commands are described (secrets masked) and a synthetic
//!   success is returned; nothing is spawned
//!
//! The `*_read_only` entry points ignore dry-run. They exist for discovery
//! (does a tool exist, which branch is checked out, which Xcode is installed)
//! whose answers must reflect the real machine even during a rehearsal.

use crate::error::CommandError;
use crate::models::{CommandResult, EnvironmentOverrides};
use crate::system::command::{shell_quote, ArgvCommand, ShellCommand, SHELL};
use crate::system::masking::{describe_invocation, render_environment};
use crate::system::streaming::{
    drain_stream, CapturedOutput, ConsoleSink, OutputSink, SharedCapture, StreamKind,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use tokio::sync::watch;

/// The two command forms the runner accepts.
#[derive(Debug, Clone, Copy)]
enum Invocation<'a> {
    Shell(&'a ShellCommand),
    Argv(&'a ArgvCommand),
}

impl Invocation<'_> {
    fn display(&self) -> String {
        match self {
            Invocation::Shell(command) => command.as_str().to_string(),
            Invocation::Argv(command) => command.display_string(),
        }
    }

    fn to_process(
        self,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Command {
        let mut process = match self {
            Invocation::Shell(command) => {
                let mut process = Command::new(SHELL);
                process.arg("-c").arg(command.as_str());
                process
            }
            Invocation::Argv(command) => {
                let mut process = Command::new(command.program());
                process.args(command.arguments());
                process
            }
        };
        if let Some(dir) = working_directory {
            process.current_dir(dir);
        }
        // Overrides are merged over the inherited environment
        process.envs(environment);
        process.stdin(Stdio::null());
        process
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Executes, or simulates executing, external commands.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    dry_run: bool,
    verbose: bool,
}

impl ProcessRunner {
    /// Create a runner.
    ///
    /// # Arguments
    /// * `dry_run` - Describe commands instead of running them
    /// * `verbose` - Echo each live command to stderr before running it
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        ProcessRunner { dry_run, verbose }
    }

    pub fn live() -> Self {
        Self::new(false, false)
    }

    pub fn dry_run() -> Self {
        Self::new(true, false)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Run a shell command and capture its output.
    ///
    /// In dry-run mode the command is described and a synthetic success
    /// (exit 0, empty output) is returned. A non-zero exit is not an error;
    /// inspect [`CommandResult::exit_code`].
    ///
    /// # Errors
    /// `CommandError::Io` if the shell could not be launched.
    pub async fn execute(
        &self,
        command: impl Into<ShellCommand>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        let command = command.into();
        self.run(Invocation::Shell(&command), working_directory, environment)
            .await
    }

    /// Like [`execute`](Self::execute) but fails on a non-zero exit.
    ///
    /// # Errors
    /// `CommandError::ExecutionFailed` carrying the full result when the
    /// command exits non-zero.
    pub async fn execute_or_throw(
        &self,
        command: impl Into<ShellCommand>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        let result = self
            .execute(command, working_directory, environment)
            .await?;
        ensure_success(result)
    }

    /// Run a shell command for real even when the runner is in dry-run mode.
    pub async fn execute_read_only(
        &self,
        command: impl Into<ShellCommand>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        let command = command.into();
        self.run_live(Invocation::Shell(&command), working_directory, environment)
            .await
    }

    /// Run a program with an argument vector; no shell is involved.
    pub async fn execute_args(
        &self,
        command: &ArgvCommand,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        self.run(Invocation::Argv(command), working_directory, environment)
            .await
    }

    /// Argument-vector form of [`execute_or_throw`](Self::execute_or_throw).
    pub async fn execute_args_or_throw(
        &self,
        command: &ArgvCommand,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        let result = self
            .execute_args(command, working_directory, environment)
            .await?;
        ensure_success(result)
    }

    /// Argument-vector form of [`execute_read_only`](Self::execute_read_only).
    pub async fn execute_args_read_only(
        &self,
        command: &ArgvCommand,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        self.run_live(Invocation::Argv(command), working_directory, environment)
            .await
    }

    /// Run a shell command, echoing its output to the console as it arrives.
    ///
    /// # Errors
    /// `CommandError::ExecutionFailed` after the process completes with a
    /// non-zero exit; `CommandError::Io` if it could not be launched.
    pub async fn execute_with_streaming_output(
        &self,
        command: impl Into<ShellCommand>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        self.execute_streaming_to(
            command,
            working_directory,
            environment,
            Arc::new(ConsoleSink),
        )
        .await
    }

    /// Run a shell command, forwarding output chunks to `sink` as they
    /// arrive while also capturing them for the returned result.
    ///
    /// stdout and stderr are drained by two independent tasks; the calling
    /// task waits for the process to exit and only then tells the drains to
    /// finish, so a child blocked on a full pipe can never deadlock us.
    pub async fn execute_streaming_to(
        &self,
        command: impl Into<ShellCommand>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
        sink: Arc<dyn OutputSink>,
    ) -> Result<CommandResult, CommandError> {
        let command = command.into();
        let invocation = Invocation::Shell(&command);
        if self.dry_run {
            return Ok(self.simulate(invocation, working_directory, environment));
        }
        self.echo(invocation, working_directory, environment);

        let mut process = invocation.to_process(working_directory, environment);
        process.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = process.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr was not captured"))?;

        let captured: SharedCapture = Arc::new(Mutex::new(CapturedOutput::default()));
        let (stop_tx, stop_rx) = watch::channel(false);

        let stdout_drain = tokio::spawn(drain_stream(
            stdout,
            StreamKind::Stdout,
            Arc::clone(&captured),
            Arc::clone(&sink),
            stop_rx.clone(),
        ));
        let stderr_drain = tokio::spawn(drain_stream(
            stderr,
            StreamKind::Stderr,
            Arc::clone(&captured),
            Arc::clone(&sink),
            stop_rx,
        ));

        // Exit-wait controller: the only place allowed to stop the drains
        let status = child.wait().await;
        let _ = stop_tx.send(true);

        let stdout_outcome = stdout_drain.await;
        let stderr_outcome = stderr_drain.await;
        sink.finish();

        let status = status?;
        for outcome in [stdout_outcome, stderr_outcome] {
            outcome.map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        }

        let captured = std::mem::take(&mut *captured.lock().unwrap_or_else(PoisonError::into_inner));
        let (stdout, stderr) = captured.into_strings();
        let result = CommandResult::new(exit_code(status), stdout, stderr, command.as_str());
        log::debug!(
            "[Runner] [STREAM] '{}' exited with {}",
            result.original_command,
            result.exit_code
        );
        ensure_success(result)
    }

    /// True if `name` resolves on `PATH`. Runs even in dry-run mode and
    /// degrades to `false` if the lookup itself cannot run.
    pub async fn command_exists(&self, name: &str) -> bool {
        self.resolve_command(name).await.is_some()
    }

    /// Resolve `name` on `PATH`.
    ///
    /// # Errors
    /// `CommandError::CommandNotFound` if it does not resolve.
    pub async fn require_command(&self, name: &str) -> Result<PathBuf, CommandError> {
        self.resolve_command(name)
            .await
            .ok_or_else(|| CommandError::CommandNotFound(name.to_string()))
    }

    async fn resolve_command(&self, name: &str) -> Option<PathBuf> {
        if name.trim().is_empty() {
            return None;
        }
        let lookup = format!("command -v {}", shell_quote(name));
        match self
            .execute_read_only(lookup, None, &EnvironmentOverrides::new())
            .await
        {
            Ok(result) if result.is_success() => {
                let resolved = result.stdout.trim();
                (!resolved.is_empty()).then(|| PathBuf::from(resolved))
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("[Runner] Could not look up '{}': {}", name, e);
                None
            }
        }
    }

    async fn run(
        &self,
        invocation: Invocation<'_>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        if self.dry_run {
            return Ok(self.simulate(invocation, working_directory, environment));
        }
        self.run_live(invocation, working_directory, environment)
            .await
    }

    async fn run_live(
        &self,
        invocation: Invocation<'_>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> Result<CommandResult, CommandError> {
        self.echo(invocation, working_directory, environment);

        let output = invocation
            .to_process(working_directory, environment)
            .output()
            .await?;

        let result = CommandResult::new(
            exit_code(output.status),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            invocation.display(),
        );
        log::debug!(
            "[Runner] '{}' exited with {}",
            result.original_command,
            result.exit_code
        );
        Ok(result)
    }

    fn simulate(
        &self,
        invocation: Invocation<'_>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) -> CommandResult {
        let text = invocation.display();
        println!(
            "{}",
            describe_invocation(&text, working_directory, environment)
        );
        log::info!("[Runner] [DRY-RUN] Skipped: {}", text);
        CommandResult::simulated(text)
    }

    fn echo(
        &self,
        invocation: Invocation<'_>,
        working_directory: Option<&Path>,
        environment: &EnvironmentOverrides,
    ) {
        let text = invocation.display();
        if environment.is_empty() {
            log::debug!("[Runner] Executing: {}", text);
        } else {
            log::debug!(
                "[Runner] Executing: {} [{}]",
                text,
                render_environment(environment).join(" ")
            );
        }
        if !self.verbose {
            return;
        }
        let mut line = format!("$ {}", text);
        if let Some(dir) = working_directory {
            line.push_str(&format!("  (in {})", dir.display()));
        }
        if !environment.is_empty() {
            line.push_str(&format!("  [{}]", render_environment(environment).join(" ")));
        }
        eprintln!("{}", line);
    }
}

fn ensure_success(result: CommandResult) -> Result<CommandResult, CommandError> {
    if result.is_success() {
        Ok(result)
    } else {
        Err(CommandError::ExecutionFailed(result))
    }
}
