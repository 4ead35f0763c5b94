//! Settings validation.

use crate::config::{BuildSettings, ReleaseEnvironment};
use crate::error::ConfigError;

/// Validate a toolchain version constraint (dot-separated numbers, e.g. "15.2").
pub fn validate_toolchain_version(version: &str) -> Result<(), ConfigError> {
    if version.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Toolchain version cannot be empty".to_string(),
        ));
    }

    for (i, part) in version.trim().split('.').enumerate() {
        if part.is_empty() || part.parse::<u32>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Toolchain version part {} must be a non-negative number, got: '{}'",
                i, part
            )));
        }
    }

    Ok(())
}

/// Validate one release environment.
pub fn validate_release_environment(
    name: &str,
    environment: &ReleaseEnvironment,
) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Release environment name cannot be empty".to_string(),
        ));
    }

    if environment.scheme.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(format!(
            "Release environment '{}' has an empty scheme",
            name
        )));
    }

    // output_name becomes a file name under build_dir
    let output = environment.output_name.trim();
    if output.is_empty() || output.contains('/') || output == "." || output == ".." {
        return Err(ConfigError::ValidationFailed(format!(
            "Release environment '{}' has an invalid output_name: '{}'",
            name, environment.output_name
        )));
    }

    for (bundle_id, profile) in &environment.provisioning_profiles {
        if bundle_id.trim().is_empty() || profile.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "Release environment '{}' has an incomplete provisioning profile entry",
                name
            )));
        }
    }

    Ok(())
}

/// Validate complete settings.
pub fn validate_settings(settings: &BuildSettings) -> Result<(), ConfigError> {
    if settings.workspace.is_some() && settings.project.is_some() {
        return Err(ConfigError::ValidationFailed(
            "Specify either 'workspace' or 'project', not both".to_string(),
        ));
    }

    if settings.build_dir.as_os_str().is_empty() || settings.reports_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "build_dir and reports_dir cannot be empty".to_string(),
        ));
    }

    if let Some(version) = &settings.toolchain_version {
        if !version.trim().is_empty() {
            validate_toolchain_version(version)?;
        }
    }

    if !settings.discovery.version_command.contains("{app}") {
        return Err(ConfigError::ValidationFailed(
            "discovery.version_command must contain the {app} placeholder".to_string(),
        ));
    }

    for (name, environment) in &settings.environments {
        validate_release_environment(name, environment)?;
    }

    Ok(())
}
