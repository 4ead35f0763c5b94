//! Unified error type hierarchy for Shipwright
//!
//! Provides structured error handling with CommandError, ToolchainError,
//! ConfigError and OrchestratorError.

use crate::models::CommandResult;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Number of trailing output lines carried into rendered error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Process execution errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Non-zero exit from a throwing entry point. Carries the full result.
    #[error("Command '{}' failed with exit code {}", .0.original_command, .0.exit_code)]
    ExecutionFailed(CommandResult),

    #[error("Command not found in PATH: {0}")]
    CommandNotFound(String),

    /// The process could not be launched at all (missing interpreter, bad cwd, ...)
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CommandError {
    /// The captured result, when the command ran to completion.
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            CommandError::ExecutionFailed(result) => Some(result),
            _ => None,
        }
    }
}

/// Toolchain discovery and version resolution errors.
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("No installed toolchain matches version {0}")]
    VersionNotFound(String),

    #[error("Failed to read toolchain version at {path}: {reason}")]
    VersionFetchFailed { path: PathBuf, reason: String },
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Build phase orchestration errors.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Release environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Refusing to delete unsafe path '{path}': {reason}")]
    UnsafePathDeletion { path: String, reason: String },

    #[error("Generated package not found in {0}")]
    PackageNotFound(PathBuf),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl OrchestratorError {
    /// Get a user-facing error message suitable for terminal display
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::EnvironmentNotFound(name) => format!(
                "Release environment '{}' is not defined in the configuration",
                name
            ),
            OrchestratorError::UnsafePathDeletion { path, reason } => {
                format!("Refused to delete '{}': {}", path, reason)
            }
            OrchestratorError::PackageNotFound(dir) => format!(
                "No .ipa package found in {}. Run export first.",
                dir.display()
            ),
            OrchestratorError::Command(CommandError::ExecutionFailed(result)) => {
                let tail = result.output_tail(ERROR_TAIL_LINES);
                if tail.is_empty() {
                    format!(
                        "'{}' exited with code {}",
                        result.original_command, result.exit_code
                    )
                } else {
                    format!(
                        "'{}' exited with code {}:\n{}",
                        result.original_command, result.exit_code, tail
                    )
                }
            }
            OrchestratorError::Command(e) => format!("Failed to run command: {}", e),
            OrchestratorError::Toolchain(ToolchainError::VersionNotFound(version)) => format!(
                "Xcode {} is not installed (looked for versions matching ~> {})",
                version, version
            ),
            OrchestratorError::Toolchain(e) => format!("Toolchain error: {}", e),
            OrchestratorError::Config(e) => format!("Configuration error: {}", e),
            OrchestratorError::Io(e) => format!("File operation failed: {}", e),
        }
    }
}

/// Top-level result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
