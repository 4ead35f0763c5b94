//! Core data structures shared by the runner, resolver and orchestrator.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Environment variables merged over the inherited process environment for a
/// single invocation. Ordered so that diagnostics print deterministically.
pub type EnvironmentOverrides = BTreeMap<String, String>;

/// Immutable record of a finished or simulated process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code (`-1` when the process was terminated by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// The command text as it was handed to the shell
    pub original_command: String,
}

impl CommandResult {
    pub fn new(
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        original_command: impl Into<String>,
    ) -> Self {
        CommandResult {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            original_command: original_command.into(),
        }
    }

    /// Synthetic result returned by dry-run execution.
    pub fn simulated(original_command: impl Into<String>) -> Self {
        CommandResult::new(0, "", "", original_command)
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout and stderr joined by a newline, omitting whichever is empty.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Last `max_lines` lines of stderr (or stdout when stderr is empty).
    ///
    /// Used to keep error messages readable when a build driver emits
    /// thousands of lines before failing.
    pub fn output_tail(&self, max_lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// An installed, versioned copy of the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainCandidate {
    /// Path to the application bundle (e.g. `/Applications/Xcode-16.2.app`)
    pub install_path: PathBuf,
    /// Marketing version read from the bundle (e.g. `16.2`)
    pub version: String,
}

impl ToolchainCandidate {
    pub fn new(install_path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        ToolchainCandidate {
            install_path: install_path.into(),
            version: version.into(),
        }
    }

    /// Value for `DEVELOPER_DIR` that points build tools at this installation.
    pub fn developer_dir(&self) -> PathBuf {
        self.install_path.join("Contents").join("Developer")
    }
}

/// Log file and result bundle locations for one phase invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifactPaths {
    pub log_path: PathBuf,
    pub result_bundle_path: PathBuf,
}
