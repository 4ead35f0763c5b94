//! Deletion safety gate for build artifact paths.
//!
//! Every recursive delete issued by the orchestrator goes through
//! [`SafetyCheckedPath::new`] first. A path is accepted only when:
//! 1. it is not blank after trimming
//! 2. it is not a protected system root, and not nested under one of the
//!    roots that never hold build output
//! 3. it names something that looks like a build artifact
//!
//! Check 2 runs before check 3, so a path under `/private` is refused even
//! when it also mentions `reports` or ends in `.log`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Roots that may never be deleted themselves.
const PROTECTED_ROOTS: &[&str] = &[
    "/",
    "/Applications",
    "/Library",
    "/System",
    "/Users",
    "/Volumes",
    "/bin",
    "/sbin",
    "/usr",
    "/etc",
    "/opt",
    "/var",
    "/tmp",
    "/private",
    "/cores",
    "/dev",
    "/home",
    "/root",
];

/// Roots whose whole subtree is off limits.
///
/// `/Users` and `/var` are deliberately absent: projects live under home
/// directories and temporary build trees under `/var/folders`.
const PROTECTED_SUBTREES: &[&str] = &[
    "/System",
    "/Library",
    "/Applications",
    "/bin",
    "/sbin",
    "/usr",
    "/etc",
    "/private",
    "/dev",
];

/// Words that mark a path component as build output. Matched against the
/// component's `-`, `_`, `.` or space separated words, so `App-export`
/// qualifies and `buildkite` does not.
const ARTIFACT_WORDS: &[&str] = &["build", "reports", "deriveddata", "export"];

/// File extensions of build output.
const ARTIFACT_EXTENSIONS: &[&str] = &[".xcarchive", ".ipa", ".log", ".xcresult"];

/// True if the lowercase component `name` looks like build output.
fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        || name
            .split(|c: char| matches!(c, '-' | '_' | '.' | ' '))
            .any(|word| ARTIFACT_WORDS.contains(&word))
}

/// Why a path failed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafePathReason {
    Blank,
    ProtectedRoot(String),
    InsideProtectedRoot(String),
    NoArtifactIndicator,
}

impl fmt::Display for UnsafePathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafePathReason::Blank => write!(f, "path is empty"),
            UnsafePathReason::ProtectedRoot(root) => {
                write!(f, "{} is a protected system directory", root)
            }
            UnsafePathReason::InsideProtectedRoot(root) => {
                write!(f, "path is inside protected directory {}", root)
            }
            UnsafePathReason::NoArtifactIndicator => write!(
                f,
                "path does not look like build output (expected a component named {} or ending in {})",
                ARTIFACT_WORDS.join("/"),
                ARTIFACT_EXTENSIONS.join("/")
            ),
        }
    }
}

/// A path that passed the deletion safety gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyCheckedPath(PathBuf);

impl SafetyCheckedPath {
    /// Run `raw` through the gate.
    ///
    /// Relative paths are checked as given; callers resolve them against the
    /// project root first when they want the absolute form checked.
    pub fn new(raw: &str) -> Result<Self, UnsafePathReason> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UnsafePathReason::Blank);
        }

        let normalized = normalize_lexically(Path::new(trimmed));
        if normalized.as_os_str().is_empty() {
            return Err(UnsafePathReason::Blank);
        }

        // APFS and HFS+ are case-insensitive by default
        let folded = PathBuf::from(normalized.to_string_lossy().to_lowercase());
        for root in PROTECTED_ROOTS {
            if folded == Path::new(&root.to_lowercase()) {
                return Err(UnsafePathReason::ProtectedRoot(root.to_string()));
            }
        }
        for root in PROTECTED_SUBTREES {
            if folded.starts_with(root.to_lowercase()) {
                return Err(UnsafePathReason::InsideProtectedRoot(root.to_string()));
            }
        }

        if !folded.components().any(|component| {
            matches!(component, Component::Normal(name) if is_artifact_name(&name.to_string_lossy()))
        }) {
            return Err(UnsafePathReason::NoArtifactIndicator);
        }

        Ok(SafetyCheckedPath(normalized))
    }

    pub fn from_path(path: &Path) -> Result<Self, UnsafePathReason> {
        Self::new(&path.to_string_lossy())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for SafetyCheckedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolve `.` and `..` without touching the filesystem.
///
/// `..` never climbs above the root, so `/Users/me/../../..` becomes `/`
/// and is caught as a protected root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none() && normalized.has_root();
                if !at_root && !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
