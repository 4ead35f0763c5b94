//! Pessimistic version matching.
//!
//! A constraint such as `17.2` accepts every installed version sharing the
//! constraint's leading components (`17.`), mirroring `~> 17.2`.

use crate::error::ToolchainError;
use crate::models::ToolchainCandidate;
use std::cmp::Ordering;

/// Prefix a candidate version must start with to satisfy `target`.
///
/// - "26.1.1" → "26.1."
/// - "26.1" → "26."
/// - "26" → "26."
pub fn pessimistic_prefix(target: &str) -> String {
    let target = target.trim();
    match target.rfind('.') {
        Some(idx) => format!("{}.", &target[..idx]),
        None => format!("{}.", target),
    }
}

/// Split a version into numeric components.
///
/// Anything after the first non-digit of a component is ignored, so
/// "15.0b2" compares as (15, 0).
fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Component-wise integer comparison; missing components count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (components(a), components(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Pick the candidate that best satisfies `target`.
///
/// An exact version string match wins outright. Otherwise the numerically
/// highest candidate starting with [`pessimistic_prefix`] is chosen.
///
/// # Errors
/// `ToolchainError::VersionNotFound` carrying `target` when nothing matches.
pub fn select_best_match(
    target: &str,
    candidates: &[ToolchainCandidate],
) -> Result<ToolchainCandidate, ToolchainError> {
    let wanted = target.trim();

    if let Some(exact) = candidates.iter().find(|c| c.version.trim() == wanted) {
        return Ok(exact.clone());
    }

    let prefix = pessimistic_prefix(wanted);
    candidates
        .iter()
        .filter(|c| c.version.trim().starts_with(&prefix))
        .max_by(|a, b| compare_versions(&a.version, &b.version))
        .cloned()
        .ok_or_else(|| ToolchainError::VersionNotFound(target.to_string()))
}
