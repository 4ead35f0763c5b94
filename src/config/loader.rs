//! Settings file loader and serialization.

use crate::config::validator::validate_settings;
use crate::config::{BuildSettings, SETTINGS_FILE_NAME};
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Load settings from a JSON file.
///
/// A relative `project_root` (including the default `.`) is resolved against
/// the directory containing the file, so the same file works no matter where
/// the binary is launched from.
pub fn load_settings_from_file(path: &Path) -> Result<BuildSettings, ConfigError> {
    validate_settings_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Settings file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let mut settings: BuildSettings =
        serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;

    if settings.project_root.is_relative() {
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        settings.project_root = if settings.project_root == Path::new(".") {
            base.to_path_buf()
        } else {
            base.join(&settings.project_root)
        };
    }

    validate_settings(&settings)?;
    log::debug!(
        "[Config] Loaded settings from {} ({} release environments)",
        path.display(),
        settings.environments.len()
    );
    Ok(settings)
}

/// Save settings to a JSON file.
pub fn save_settings_to_file(settings: &BuildSettings, path: &Path) -> Result<(), ConfigError> {
    validate_settings_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(ConfigError::IoError)?;
        }
    }

    let json_content =
        serde_json::to_string_pretty(settings).map_err(ConfigError::InvalidJson)?;
    fs::write(path, json_content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Validate settings path (.json extension required).
pub fn validate_settings_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Settings path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => {}
        Some(ext) => {
            return Err(ConfigError::ValidationFailed(format!(
                "Settings file must have .json extension, got .{}",
                ext.to_string_lossy()
            )))
        }
        None => {
            return Err(ConfigError::ValidationFailed(
                "Settings file must have .json extension".to_string(),
            ))
        }
    }

    if path.to_str().is_none() {
        return Err(ConfigError::ValidationFailed(
            "Settings path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Per-user fallback settings path: ~/.config/shipwright/shipwright.json
pub fn global_settings_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine home directory".to_string())
    })?;
    Ok(home.join(".config/shipwright").join(SETTINGS_FILE_NAME))
}

/// Walk up from `start` looking for `shipwright.json`.
pub fn find_settings_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(SETTINGS_FILE_NAME))
        .find(|candidate| candidate.is_file())
}
