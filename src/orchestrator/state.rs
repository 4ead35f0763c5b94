//! Build phase tracking.
//!
//! The orchestrator runs phases in a fixed order:
//! clean → build-for-testing → test → archive → export → upload.
//! Each operation runs one phase (build-for-testing optionally preceded by
//! clean); nothing about a phase is persisted between invocations.

use std::fmt;

/// Discrete toolchain phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Clean,
    BuildForTesting,
    Test,
    Archive,
    Export,
    Upload,
}

impl BuildPhase {
    /// All phases in pipeline order.
    pub const ALL: [BuildPhase; 6] = [
        BuildPhase::Clean,
        BuildPhase::BuildForTesting,
        BuildPhase::Test,
        BuildPhase::Archive,
        BuildPhase::Export,
        BuildPhase::Upload,
    ];

    /// Name used in report file names and log tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Clean => "clean",
            BuildPhase::BuildForTesting => "build-for-testing",
            BuildPhase::Test => "test",
            BuildPhase::Archive => "archive",
            BuildPhase::Export => "export",
            BuildPhase::Upload => "upload",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
