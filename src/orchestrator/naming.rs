//! Deterministic artifact naming.
//!
//! Every phase writes its log and result bundle under a report name derived
//! only from its inputs, so reruns overwrite their own reports and two
//! destinations never collide.

use crate::models::ReportArtifactPaths;
use crate::orchestrator::state::BuildPhase;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("Invalid name sanitizer regex"));

/// Destination fields that identify a run, in output order.
const DESCRIPTOR_KEYS: &[&str] = &["platform", "os", "name", "id", "arch", "variant"];

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_component(raw: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(raw, "_").into_owned()
}

/// Condense an xcodebuild destination specifier into a name fragment.
///
/// `platform=iOS Simulator,name=iPhone 15,OS=17.2` becomes
/// `iOSSimulator17.2iPhone15`. Values of the known keys come first in
/// [`DESCRIPTOR_KEYS`] order; any other `key=value` pair is appended as
/// `key=value` in its original order, so no field of the specifier is lost.
/// Specifiers without any known key (for example `generic/platform=iOS`)
/// fall back to the whole specifier. Whitespace is removed throughout.
pub fn destination_descriptor(destination: &str) -> String {
    let fields: Vec<(String, &str)> = destination
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value))
        .collect();

    let mut descriptor = String::new();
    for wanted in DESCRIPTOR_KEYS {
        if let Some((_, value)) = fields.iter().find(|(key, _)| key.as_str() == *wanted) {
            descriptor.push_str(value);
        }
    }

    if descriptor.trim().is_empty() {
        descriptor = destination.to_string();
    } else {
        for (key, value) in &fields {
            if !DESCRIPTOR_KEYS.contains(&key.as_str()) {
                descriptor.push_str(&format!("{}={}", key, value));
            }
        }
    }
    descriptor.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `<phase>_<scheme>_<qualifier>`, sanitized.
///
/// The qualifier is the destination descriptor for test phases and the
/// release environment name for release phases.
pub fn report_name(phase: BuildPhase, scheme: &str, qualifier: &str) -> String {
    sanitize_component(&format!("{}_{}_{}", phase.as_str(), scheme, qualifier))
}

/// Report name for a phase run against a destination.
pub fn destination_report_name(phase: BuildPhase, scheme: &str, destination: &str) -> String {
    report_name(phase, scheme, &destination_descriptor(destination))
}

/// Log and result bundle paths for `report`.
pub fn artifact_paths(report: &str, build_dir: &Path, reports_dir: &Path) -> ReportArtifactPaths {
    ReportArtifactPaths {
        log_path: reports_dir.join(format!("{}.log", report)),
        result_bundle_path: build_dir.join(format!("{}.xcresult", report)),
    }
}

pub fn archive_path(build_dir: &Path, output_name: &str) -> PathBuf {
    build_dir.join(format!("{}.xcarchive", output_name))
}

pub fn export_dir(build_dir: &Path, output_name: &str) -> PathBuf {
    build_dir.join(format!("{}-export", output_name))
}

pub fn export_options_path(build_dir: &Path, output_name: &str) -> PathBuf {
    build_dir.join(format!("{}-ExportOptions.plist", output_name))
}

/// Where export is expected to place the package.
pub fn expected_package_path(export_dir: &Path, output_name: &str) -> PathBuf {
    export_dir.join(format!("{}.ipa", output_name))
}

/// The exported package: `<output_name>.ipa` if present, otherwise the
/// first `*.ipa` in `export_dir` by name.
pub fn locate_package(export_dir: &Path, output_name: &str) -> Option<PathBuf> {
    let expected = expected_package_path(export_dir, output_name);
    if expected.is_file() {
        return Some(expected);
    }

    let mut packages: Vec<PathBuf> = fs::read_dir(export_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "ipa"))
        .collect();
    packages.sort();
    packages.into_iter().next()
}
