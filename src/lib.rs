//! Shipwright: command execution and Xcode build orchestration.
//!
//! The crate runs external processes safely (capturing, streaming, or
//! rehearsing them in dry-run mode) and sequences the Xcode phases of an iOS
//! release: clean, build-for-testing, test, archive, export and upload.
//!
//! The system is organized into functional modules:
//! - **error**: Error types per concern
//! - **models**: Shared records (`CommandResult`, toolchain candidates, report paths)
//! - **system**: Process runner, output streaming, masking, deletion safety gate
//! - **toolchain**: Xcode discovery and pessimistic version resolution
//! - **config**: `shipwright.json` settings and the settings provider seam
//! - **orchestrator**: Phase sequencing and artifact naming
//! - **vcs**: Git client on top of the runner
//! - **log_collector**: Session log file behind the `log` facade

// Core foundational modules
pub mod error;
pub mod models;

// Process execution and OS access
pub mod system;

// Toolchain discovery and version matching
pub mod toolchain;

// Settings loading and validation
pub mod config;

// Phase sequencing
pub mod orchestrator;

pub mod vcs;

pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{CommandError, ConfigError, OrchestratorError, Result, ToolchainError};

pub use models::{CommandResult, EnvironmentOverrides, ReportArtifactPaths, ToolchainCandidate};

pub use system::{
    ArgvCommand, EnvProvider, LineBuffer, MapEnv, ProcessEnv, ProcessRunner, SafetyCheckedPath,
    ShellCommand,
};

pub use toolchain::ToolchainResolver;

pub use config::{BuildSettings, ReleaseEnvironment, SettingsProvider};

pub use orchestrator::{BuildOrchestrator, BuildPhase};

pub use vcs::GitClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
