//! Masking of sensitive environment values in printed diagnostics.

use crate::models::EnvironmentOverrides;
use std::path::Path;

/// Placeholder printed instead of a sensitive value.
pub const MASK: &str = "***";

/// Key fragments that mark an environment variable as sensitive.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "pass",
    "secret",
    "token",
    "key",
    "api",
    "private",
    "auth",
    "credential",
    "signing",
    "cert",
    "certificate",
    "jwt",
    "oauth",
    "bearer",
    "access",
];

/// True if `key` contains any sensitive fragment, case-insensitively.
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// Render `KEY=value` with the value masked when the key is sensitive.
pub fn render_assignment(key: &str, value: &str) -> String {
    if is_sensitive_key(key) {
        format!("{}={}", key, MASK)
    } else {
        format!("{}={}", key, value)
    }
}

/// Render all overrides as masked `KEY=value` pairs, in key order.
pub fn render_environment(environment: &EnvironmentOverrides) -> Vec<String> {
    environment
        .iter()
        .map(|(key, value)| render_assignment(key, value))
        .collect()
}

/// Multi-line description of an invocation that dry-run mode skips.
///
/// The working directory is only mentioned when one was given explicitly;
/// environment overrides are listed with sensitive values masked.
pub fn describe_invocation(
    command: &str,
    working_directory: Option<&Path>,
    environment: &EnvironmentOverrides,
) -> String {
    let mut lines = vec![format!("[DRY RUN] Would execute: {}", command)];
    if let Some(dir) = working_directory {
        lines.push(format!("[DRY RUN]   in directory: {}", dir.display()));
    }
    if !environment.is_empty() {
        lines.push(format!(
            "[DRY RUN]   with environment: {}",
            render_environment(environment).join(" ")
        ));
    }
    lines.join("\n")
}
