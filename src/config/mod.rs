//! Build configuration for the orchestrator.
//!
//! # Module Structure
//!
//! - `loader`: reads and writes `shipwright.json` and locates it on disk
//! - `validator`: checks settings for conflicts before any phase runs
//!
//! # Settings Flow
//!
//! 1. `find_settings_file` walks up from the working directory
//! 2. `load_settings_from_file` parses and validates the JSON
//! 3. The orchestrator reads everything through [`SettingsProvider`]
//!
//! Relative directories in the file are resolved against `project_root`,
//! which itself defaults to the directory holding the settings file.

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings file name searched for by [`loader::find_settings_file`].
pub const SETTINGS_FILE_NAME: &str = "shipwright.json";

/// Default Spotlight query for installed Xcode copies.
pub const DEFAULT_INDEX_COMMAND: &str =
    "mdfind \"kMDItemCFBundleIdentifier == 'com.apple.dt.Xcode'\"";

/// Default version read; `{app}` is replaced by the shell-quoted app path.
pub const DEFAULT_VERSION_COMMAND: &str =
    "/usr/libexec/PlistBuddy -c 'Print :CFBundleShortVersionString' {app}/Contents/Info.plist";

/// Executables the orchestrator invokes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub xcodebuild: String,
    pub xcrun: String,
    pub git: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            xcodebuild: "xcodebuild".to_string(),
            xcrun: "xcrun".to_string(),
            git: "git".to_string(),
        }
    }
}

/// How installed toolchains are found and their versions read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Indexed lookup printing one app path per line
    pub index_command: String,
    /// Directory scanned when the indexed lookup finds nothing
    pub applications_dir: PathBuf,
    /// Bundle name prefix matched during the directory scan
    pub app_name_prefix: String,
    /// Version read template containing an `{app}` placeholder
    pub version_command: String,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings {
            index_command: DEFAULT_INDEX_COMMAND.to_string(),
            applications_dir: PathBuf::from("/Applications"),
            app_name_prefix: "Xcode".to_string(),
            version_command: DEFAULT_VERSION_COMMAND.to_string(),
        }
    }
}

/// Release profile used by archive, export and upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEnvironment {
    pub scheme: String,
    #[serde(default = "default_configuration")]
    pub configuration: String,
    /// Base name for the archive, export directory and package
    pub output_name: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_export_method")]
    pub export_method: String,
    #[serde(default)]
    pub signing_certificate: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Bundle identifier -> provisioning profile name
    #[serde(default)]
    pub provisioning_profiles: BTreeMap<String, String>,
    #[serde(default)]
    pub upload_account: Option<String>,
}

fn default_configuration() -> String {
    "Release".to_string()
}

fn default_export_method() -> String {
    "app-store".to_string()
}

impl ReleaseEnvironment {
    pub fn new(scheme: impl Into<String>, output_name: impl Into<String>) -> Self {
        ReleaseEnvironment {
            scheme: scheme.into(),
            configuration: default_configuration(),
            output_name: output_name.into(),
            destination: None,
            export_method: default_export_method(),
            signing_certificate: None,
            team_id: None,
            provisioning_profiles: BTreeMap::new(),
            upload_account: None,
        }
    }
}

/// Which container xcodebuild should open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildTarget {
    Workspace(PathBuf),
    Project(PathBuf),
}

impl BuildTarget {
    /// `-workspace <path>` or `-project <path>`.
    pub fn to_args(&self) -> [String; 2] {
        match self {
            BuildTarget::Workspace(path) => {
                ["-workspace".to_string(), path.display().to_string()]
            }
            BuildTarget::Project(path) => ["-project".to_string(), path.display().to_string()],
        }
    }
}

/// Complete contents of `shipwright.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub project_root: PathBuf,
    pub workspace: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub build_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Xcode version constraint, e.g. "15.2"
    pub toolchain_version: Option<String>,
    pub tools: ToolPaths,
    pub discovery: DiscoverySettings,
    pub environments: BTreeMap<String, ReleaseEnvironment>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            project_root: PathBuf::from("."),
            workspace: None,
            project: None,
            build_dir: PathBuf::from("build"),
            reports_dir: PathBuf::from("reports"),
            toolchain_version: None,
            tools: ToolPaths::default(),
            discovery: DiscoverySettings::default(),
            environments: BTreeMap::new(),
        }
    }
}

impl BuildSettings {
    /// Settings rooted at `project_root` with every other field defaulted.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        BuildSettings {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// Read access to the configuration the orchestrator consumes.
pub trait SettingsProvider: Send + Sync {
    fn project_root(&self) -> &Path;

    /// Absolute build output directory.
    fn build_dir(&self) -> PathBuf;

    /// Absolute reports directory.
    fn reports_dir(&self) -> PathBuf;

    fn build_target(&self) -> Option<BuildTarget>;

    fn toolchain_version(&self) -> Option<&str>;

    fn tools(&self) -> &ToolPaths;

    fn discovery(&self) -> &DiscoverySettings;

    fn release_environment(&self, name: &str) -> Option<&ReleaseEnvironment>;

    fn environment_names(&self) -> Vec<String>;
}

impl SettingsProvider for BuildSettings {
    fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn build_dir(&self) -> PathBuf {
        self.resolve(&self.build_dir)
    }

    fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.reports_dir)
    }

    fn build_target(&self) -> Option<BuildTarget> {
        // Workspace wins; the validator rejects settings that name both
        if let Some(workspace) = &self.workspace {
            return Some(BuildTarget::Workspace(self.resolve(workspace)));
        }
        self.project
            .as_ref()
            .map(|project| BuildTarget::Project(self.resolve(project)))
    }

    fn toolchain_version(&self) -> Option<&str> {
        self.toolchain_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    fn discovery(&self) -> &DiscoverySettings {
        &self.discovery
    }

    fn release_environment(&self, name: &str) -> Option<&ReleaseEnvironment> {
        self.environments.get(name)
    }

    fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_dirs_resolve_against_project_root() {
        let settings = BuildSettings::for_project("/work/app");
        assert_eq!(settings.build_dir(), PathBuf::from("/work/app/build"));
        assert_eq!(settings.reports_dir(), PathBuf::from("/work/app/reports"));
    }

    #[test]
    fn test_absolute_dirs_are_kept() {
        let mut settings = BuildSettings::for_project("/work/app");
        settings.build_dir = PathBuf::from("/tmp/ci/build");
        assert_eq!(settings.build_dir(), PathBuf::from("/tmp/ci/build"));
    }

    #[test]
    fn test_build_target_prefers_workspace() {
        let mut settings = BuildSettings::for_project("/work/app");
        assert_eq!(settings.build_target(), None);

        settings.project = Some(PathBuf::from("App.xcodeproj"));
        assert_eq!(
            settings.build_target(),
            Some(BuildTarget::Project(PathBuf::from("/work/app/App.xcodeproj")))
        );

        settings.workspace = Some(PathBuf::from("App.xcworkspace"));
        let target = settings.build_target().unwrap();
        assert_eq!(
            target.to_args(),
            ["-workspace".to_string(), "/work/app/App.xcworkspace".to_string()]
        );
    }

    #[test]
    fn test_blank_toolchain_version_is_unset() {
        let mut settings = BuildSettings::default();
        settings.toolchain_version = Some("  ".to_string());
        assert_eq!(settings.toolchain_version(), None);
        settings.toolchain_version = Some("15.2".to_string());
        assert_eq!(settings.toolchain_version(), Some("15.2"));
    }

    #[test]
    fn test_release_environment_defaults_from_json() {
        let env: ReleaseEnvironment =
            serde_json::from_str(r#"{"scheme": "App", "output_name": "App"}"#).unwrap();
        assert_eq!(env.configuration, "Release");
        assert_eq!(env.export_method, "app-store");
        assert!(env.provisioning_profiles.is_empty());
        assert_eq!(env.upload_account, None);
    }
}
