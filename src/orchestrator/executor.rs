//! Phase command construction and phase log capture.
//!
//! Command builders here are pure: they only turn settings into shell
//! command text. Running them is the orchestrator's job.

use crate::config::BuildTarget;
use crate::system::line_buffer::LineBuffer;
use crate::system::{shell_quote, OutputSink, ShellCommand};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination used for device archives.
pub const GENERIC_IOS_DESTINATION: &str = "generic/platform=iOS";

/// Environment variable altool reads the upload password from.
pub const UPLOAD_PASSWORD_ENV: &str = "SHIPWRIGHT_UPLOAD_PASSWORD";

fn join_words<I, S>(words: I) -> ShellCommand
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = words
        .into_iter()
        .map(|word| shell_quote(word.as_ref()))
        .collect();
    ShellCommand::new(quoted.join(" "))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Words shared by every scheme-based xcodebuild call.
fn scheme_words(
    tool: &str,
    actions: &[&str],
    target: Option<&BuildTarget>,
    scheme: &str,
) -> Vec<String> {
    let mut words = vec![tool.to_string()];
    words.extend(actions.iter().map(|a| a.to_string()));
    if let Some(target) = target {
        words.extend(target.to_args());
    }
    words.push("-scheme".to_string());
    words.push(scheme.to_string());
    words
}

/// `xcodebuild clean`
pub fn clean_command(
    tool: &str,
    target: Option<&BuildTarget>,
    scheme: &str,
    destination: &str,
) -> ShellCommand {
    let mut words = scheme_words(tool, &["clean"], target, scheme);
    words.extend(["-destination".to_string(), destination.to_string()]);
    join_words(words)
}

/// `xcodebuild build-for-testing` with coverage and a result bundle.
pub fn build_for_testing_command(
    tool: &str,
    target: Option<&BuildTarget>,
    scheme: &str,
    destination: &str,
    result_bundle: &Path,
) -> ShellCommand {
    let mut words = scheme_words(tool, &["build-for-testing"], target, scheme);
    words.extend([
        "-destination".to_string(),
        destination.to_string(),
        "-enableCodeCoverage".to_string(),
        "YES".to_string(),
        "-resultBundlePath".to_string(),
        path_arg(result_bundle),
    ]);
    join_words(words)
}

/// `xcodebuild test-without-building`, serial, with coverage.
pub fn test_command(
    tool: &str,
    target: Option<&BuildTarget>,
    scheme: &str,
    destination: &str,
    result_bundle: &Path,
) -> ShellCommand {
    let mut words = scheme_words(tool, &["test-without-building"], target, scheme);
    words.extend([
        "-destination".to_string(),
        destination.to_string(),
        "-parallel-testing-enabled".to_string(),
        "NO".to_string(),
        "-enableCodeCoverage".to_string(),
        "YES".to_string(),
        "-resultBundlePath".to_string(),
        path_arg(result_bundle),
    ]);
    join_words(words)
}

/// `xcodebuild clean archive`
pub fn archive_command(
    tool: &str,
    target: Option<&BuildTarget>,
    scheme: &str,
    configuration: &str,
    destination: &str,
    archive_path: &Path,
) -> ShellCommand {
    let mut words = scheme_words(tool, &["clean", "archive"], target, scheme);
    words.extend([
        "-configuration".to_string(),
        configuration.to_string(),
        "-destination".to_string(),
        destination.to_string(),
        "-archivePath".to_string(),
        path_arg(archive_path),
    ]);
    join_words(words)
}

/// `xcodebuild -exportArchive`
pub fn export_command(
    tool: &str,
    archive_path: &Path,
    export_dir: &Path,
    options_plist: &Path,
) -> ShellCommand {
    join_words([
        tool.to_string(),
        "-exportArchive".to_string(),
        "-archivePath".to_string(),
        path_arg(archive_path),
        "-exportPath".to_string(),
        path_arg(export_dir),
        "-exportOptionsPlist".to_string(),
        path_arg(options_plist),
    ])
}

/// `xcrun altool --upload-app`.
///
/// The password never appears in the command text; with `with_password`
/// altool is told to read it from [`UPLOAD_PASSWORD_ENV`].
pub fn upload_command(
    xcrun: &str,
    package: &Path,
    account: Option<&str>,
    with_password: bool,
) -> ShellCommand {
    let mut words = vec![
        xcrun.to_string(),
        "altool".to_string(),
        "--upload-app".to_string(),
        "--type".to_string(),
        "ios".to_string(),
        "--file".to_string(),
        path_arg(package),
    ];
    if let Some(account) = account {
        words.push("-u".to_string());
        words.push(account.to_string());
    }
    if with_password {
        words.push("-p".to_string());
        words.push(format!("@env:{}", UPLOAD_PASSWORD_ENV));
    }
    join_words(words)
}

struct PhaseLogState {
    stdout: LineBuffer,
    stderr: LineBuffer,
    writer: BufWriter<File>,
    write_failed: bool,
}

impl PhaseLogState {
    fn write_lines(&mut self, lines: Vec<String>, prefix: &str) {
        if self.write_failed {
            return;
        }
        for line in lines {
            if let Err(e) = writeln!(self.writer, "{}{}", prefix, line) {
                log::warn!("[Build] [LOG] Phase log write failed: {}", e);
                self.write_failed = true;
                return;
            }
        }
    }
}

/// Forwards output to an inner sink and appends complete lines to a phase
/// log file. stderr lines are prefixed with `[STDERR] `.
pub struct PhaseLogSink {
    inner: Arc<dyn OutputSink>,
    path: PathBuf,
    state: Mutex<PhaseLogState>,
}

impl PhaseLogSink {
    /// Create (truncating) the log file at `path`.
    pub fn create(path: &Path, inner: Arc<dyn OutputSink>) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(PhaseLogSink {
            inner,
            path: path.to_path_buf(),
            state: Mutex::new(PhaseLogState {
                stdout: LineBuffer::new(),
                stderr: LineBuffer::new(),
                writer: BufWriter::new(file),
                write_failed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PhaseLogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for PhaseLogSink {
    fn on_stdout(&self, chunk: &[u8]) {
        self.inner.on_stdout(chunk);
        let mut state = self.state();
        let lines = state.stdout.append_bytes(chunk);
        state.write_lines(lines, "");
    }

    fn on_stderr(&self, chunk: &[u8]) {
        self.inner.on_stderr(chunk);
        let mut state = self.state();
        let lines = state.stderr.append_bytes(chunk);
        state.write_lines(lines, "[STDERR] ");
    }

    fn finish(&self) {
        self.inner.finish();
        let mut state = self.state();
        let residual_out: Vec<String> = state.stdout.flush().into_iter().collect();
        state.write_lines(residual_out, "");
        let residual_err: Vec<String> = state.stderr.flush().into_iter().collect();
        state.write_lines(residual_err, "[STDERR] ");
        if let Err(e) = state.writer.flush() {
            log::warn!(
                "[Build] [LOG] Could not flush {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl OutputSink for Silent {
        fn on_stdout(&self, _chunk: &[u8]) {}
        fn on_stderr(&self, _chunk: &[u8]) {}
    }

    const SIM: &str = "platform=iOS Simulator,name=iPhone 15";

    fn workspace() -> BuildTarget {
        BuildTarget::Workspace(PathBuf::from("/p/App.xcworkspace"))
    }

    #[test]
    fn test_clean_command() {
        let cmd = clean_command("xcodebuild", Some(&workspace()), "App", SIM);
        assert_eq!(
            cmd.as_str(),
            "xcodebuild clean -workspace /p/App.xcworkspace -scheme App -destination 'platform=iOS Simulator,name=iPhone 15'"
        );
    }

    #[test]
    fn test_build_for_testing_command() {
        let cmd = build_for_testing_command(
            "xcodebuild",
            None,
            "App",
            SIM,
            Path::new("/p/build/bft.xcresult"),
        );
        assert_eq!(
            cmd.as_str(),
            "xcodebuild build-for-testing -scheme App -destination 'platform=iOS Simulator,name=iPhone 15' -enableCodeCoverage YES -resultBundlePath /p/build/bft.xcresult"
        );
    }

    #[test]
    fn test_test_command_disables_parallel_testing() {
        let cmd = test_command("xcodebuild", None, "App", SIM, Path::new("/p/r.xcresult"));
        assert!(cmd.as_str().starts_with("xcodebuild test-without-building -scheme App"));
        assert!(cmd.as_str().contains("-parallel-testing-enabled NO"));
        assert!(cmd.as_str().contains("-enableCodeCoverage YES"));
    }

    #[test]
    fn test_archive_command() {
        let target = BuildTarget::Project(PathBuf::from("/p/My App.xcodeproj"));
        let cmd = archive_command(
            "xcodebuild",
            Some(&target),
            "App",
            "Release",
            GENERIC_IOS_DESTINATION,
            Path::new("/p/build/App.xcarchive"),
        );
        assert_eq!(
            cmd.as_str(),
            "xcodebuild clean archive -project '/p/My App.xcodeproj' -scheme App -configuration Release -destination generic/platform=iOS -archivePath /p/build/App.xcarchive"
        );
    }

    #[test]
    fn test_export_command() {
        let cmd = export_command(
            "xcodebuild",
            Path::new("/p/build/App.xcarchive"),
            Path::new("/p/build/App-export"),
            Path::new("/p/build/App-ExportOptions.plist"),
        );
        assert_eq!(
            cmd.as_str(),
            "xcodebuild -exportArchive -archivePath /p/build/App.xcarchive -exportPath /p/build/App-export -exportOptionsPlist /p/build/App-ExportOptions.plist"
        );
    }

    #[test]
    fn test_upload_command_uses_env_reference() {
        let cmd = upload_command(
            "xcrun",
            Path::new("/p/build/App-export/App.ipa"),
            Some("dev@example.com"),
            true,
        );
        assert!(cmd.as_str().contains("-u dev@example.com"));
        assert!(cmd.as_str().ends_with("-p @env:SHIPWRIGHT_UPLOAD_PASSWORD"));

        let without = upload_command("xcrun", Path::new("/p/App.ipa"), None, false);
        assert!(!without.as_str().contains("-p"));
        assert!(!without.as_str().contains("-u"));
    }

    #[test]
    fn test_phase_log_sink_writes_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/test.log");
        let sink = PhaseLogSink::create(&path, Arc::new(Silent)).unwrap();

        sink.on_stdout(b"Compiling A");
        sink.on_stderr(b"warning: x\n");
        sink.on_stdout(b"pp.swift\nLinking");
        sink.finish();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec!["[STDERR] warning: x", "Compiling App.swift", "Linking"]
        );
        assert_eq!(sink.path(), path.as_path());
    }

    #[test]
    fn test_phase_log_sink_keeps_split_multibyte_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let sink = PhaseLogSink::create(&path, Arc::new(Silent)).unwrap();

        let line = "✓ Test passed\n".as_bytes();
        sink.on_stdout(&line[..1]);
        sink.on_stdout(&line[1..]);
        let warning = "warning: …/Café.swift\n".as_bytes();
        let cut = "warning: …/Caf".len() + 1;
        sink.on_stderr(&warning[..cut]);
        sink.on_stderr(&warning[cut..]);
        sink.finish();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "✓ Test passed\n[STDERR] warning: …/Café.swift\n"
        );
    }
}
