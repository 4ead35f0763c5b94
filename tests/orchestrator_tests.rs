//! Build orchestration against substitute build tools.
//!
//! `fake-xcodebuild` and `fake-xcrun` are small shell scripts that echo their
//! arguments and create the artifacts the real tools would.

use shipwright::config::{BuildSettings, ReleaseEnvironment};
use shipwright::orchestrator::UPLOAD_PASSWORD_ENV;
use shipwright::system::OutputSink;
use shipwright::{
    BuildOrchestrator, CommandError, EnvProvider, MapEnv, OrchestratorError, ProcessRunner,
    ToolchainError,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const DESTINATION: &str = "platform=iOS Simulator,name=iPhone 15,OS=17.2";

const FAKE_XCODEBUILD: &str = r#"#!/bin/sh
echo "fake-xcodebuild $*"
echo "DEVELOPER_DIR=${DEVELOPER_DIR:-unset}"
echo "note: diagnostics on stderr" >&2
while [ $# -gt 0 ]; do
  case "$1" in
    -exportPath) mkdir -p "$2" && touch "$2/App.ipa"; shift ;;
    -archivePath) mkdir -p "$2"; shift ;;
    -resultBundlePath) mkdir -p "$2"; shift ;;
  esac
  shift
done
"#;

const FAKE_XCRUN: &str = r#"#!/bin/sh
echo "fake-xcrun $*"
echo "password=${SHIPWRIGHT_UPLOAD_PASSWORD:-unset}"
"#;

struct Silent;

impl OutputSink for Silent {
    fn on_stdout(&self, _chunk: &[u8]) {}
    fn on_stderr(&self, _chunk: &[u8]) {}
}

struct Fixture {
    dir: TempDir,
    settings: BuildSettings,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tools = dir.path().join("tools");
        fs::create_dir_all(&tools).unwrap();

        let mut settings = BuildSettings::for_project(dir.path());
        settings.workspace = Some(PathBuf::from("App.xcworkspace"));
        settings.tools.xcodebuild = write_script(&tools, "fake-xcodebuild", FAKE_XCODEBUILD);
        settings.tools.xcrun = write_script(&tools, "fake-xcrun", FAKE_XCRUN);

        let mut production = ReleaseEnvironment::new("App", "App");
        production.team_id = Some("ABCDE12345".to_string());
        production.upload_account = Some("dev@example.com".to_string());
        production
            .provisioning_profiles
            .insert("com.example.app".to_string(), "App Store".to_string());
        settings
            .environments
            .insert("production".to_string(), production);

        Fixture { dir, settings }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn orchestrator(&self, runner: ProcessRunner, env: MapEnv) -> BuildOrchestrator {
        let env: Arc<dyn EnvProvider> = Arc::new(env);
        BuildOrchestrator::new(runner, Arc::new(self.settings.clone()), env)
            .with_console_sink(Arc::new(Silent))
    }

    fn live(&self) -> BuildOrchestrator {
        self.orchestrator(ProcessRunner::live(), MapEnv::new())
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn test_dry_run_build_for_testing_touches_nothing() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(ProcessRunner::dry_run(), MapEnv::new());

    let artifacts = orchestrator
        .build_for_testing("App", true, DESTINATION)
        .await
        .unwrap();

    assert_eq!(
        artifacts.log_path,
        fixture
            .root()
            .join("reports/build-for-testing_App_iOSSimulator17.2iPhone15.log")
    );
    assert_eq!(
        artifacts.result_bundle_path,
        fixture
            .root()
            .join("build/build-for-testing_App_iOSSimulator17.2iPhone15.xcresult")
    );
    assert!(!fixture.root().join("build").exists());
    assert!(!fixture.root().join("reports").exists());
}

#[tokio::test]
async fn test_build_for_testing_writes_phase_logs() {
    let fixture = Fixture::new();
    let orchestrator = fixture.live();

    let artifacts = orchestrator
        .build_for_testing("App", true, DESTINATION)
        .await
        .unwrap();

    let clean_log = fixture
        .root()
        .join("reports/clean_App_iOSSimulator17.2iPhone15.log");
    let clean = fs::read_to_string(clean_log).unwrap();
    assert!(clean.contains("fake-xcodebuild clean -workspace"));

    let log = fs::read_to_string(&artifacts.log_path).unwrap();
    assert!(log.contains("fake-xcodebuild build-for-testing -workspace"));
    assert!(log.contains("-enableCodeCoverage YES"));
    assert!(log.contains("DEVELOPER_DIR=unset"));
    assert!(log.contains("[STDERR] note: diagnostics on stderr"));
    assert!(artifacts.result_bundle_path.is_dir());
}

#[tokio::test]
async fn test_run_tests_replaces_stale_result_bundle() {
    let fixture = Fixture::new();
    let orchestrator = fixture.live();
    let bundle = fixture
        .root()
        .join("build/test_App_iOSSimulator17.2iPhone15.xcresult");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("stale"), "old run").unwrap();

    let artifacts = orchestrator.run_tests("App", DESTINATION).await.unwrap();

    assert_eq!(artifacts.result_bundle_path, bundle);
    assert!(bundle.is_dir());
    assert!(!bundle.join("stale").exists());
    let log = fs::read_to_string(&artifacts.log_path).unwrap();
    assert!(log.contains("test-without-building"));
    assert!(log.contains("-parallel-testing-enabled NO"));
}

#[tokio::test]
async fn test_unknown_environment() {
    let fixture = Fixture::new();
    let orchestrator = fixture.live();

    for result in [
        orchestrator.archive("staging").await.map(|_| ()),
        orchestrator.generate_ipa("staging").await.map(|_| ()),
        orchestrator.upload("staging").await.map(|_| ()),
    ] {
        match result {
            Err(OrchestratorError::EnvironmentNotFound(name)) => assert_eq!(name, "staging"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert!(!fixture.root().join("build").exists());
}

#[tokio::test]
async fn test_archive_export_upload_pipeline() {
    let fixture = Fixture::new();
    let env = MapEnv::new().with(UPLOAD_PASSWORD_ENV, "s3cret-value");
    let orchestrator = fixture.orchestrator(ProcessRunner::live(), env);

    let archive = orchestrator.archive("production").await.unwrap();
    assert_eq!(archive, fixture.root().join("build/App.xcarchive"));
    let archive_log =
        fs::read_to_string(fixture.root().join("reports/archive_App_production.log")).unwrap();
    assert!(archive_log.contains("clean archive"));
    assert!(archive_log.contains("-configuration Release"));
    assert!(archive_log.contains("-destination generic/platform=iOS"));

    let export_dir = orchestrator.generate_ipa("production").await.unwrap();
    assert_eq!(export_dir, fixture.root().join("build/App-export"));
    let plist =
        fs::read_to_string(fixture.root().join("build/App-ExportOptions.plist")).unwrap();
    assert!(plist.contains("<string>ABCDE12345</string>"));
    assert!(plist.contains("<key>com.example.app</key>"));
    assert!(export_dir.join("App.ipa").is_file());

    let package = orchestrator.upload("production").await.unwrap();
    assert_eq!(package, export_dir.join("App.ipa"));
    let upload_log =
        fs::read_to_string(fixture.root().join("reports/upload_App_production.log")).unwrap();
    assert!(upload_log.contains("altool --upload-app"));
    assert!(upload_log.contains("-u dev@example.com"));
    assert!(upload_log.contains("-p @env:SHIPWRIGHT_UPLOAD_PASSWORD"));
    // The secret reaches the child only through its environment
    assert!(upload_log.contains("password=s3cret-value"));
    let args_line = upload_log
        .lines()
        .find(|line| line.starts_with("fake-xcrun"))
        .unwrap();
    assert!(!args_line.contains("s3cret-value"));
}

#[tokio::test]
async fn test_export_clears_stale_export_dir() {
    let fixture = Fixture::new();
    let orchestrator = fixture.live();
    let export_dir = fixture.root().join("build/App-export");
    fs::create_dir_all(&export_dir).unwrap();
    fs::write(export_dir.join("Old.ipa"), "").unwrap();

    orchestrator.generate_ipa("production").await.unwrap();

    assert!(!export_dir.join("Old.ipa").exists());
    assert!(export_dir.join("App.ipa").exists());
}

#[tokio::test]
async fn test_upload_without_password_omits_flag() {
    let fixture = Fixture::new();
    let orchestrator = fixture.live();
    let export_dir = fixture.root().join("build/App-export");
    fs::create_dir_all(&export_dir).unwrap();
    fs::write(export_dir.join("Renamed.ipa"), "").unwrap();

    let package = orchestrator.upload("production").await.unwrap();

    assert_eq!(package, export_dir.join("Renamed.ipa"));
    let upload_log =
        fs::read_to_string(fixture.root().join("reports/upload_App_production.log")).unwrap();
    assert!(!upload_log.contains("-p @env"));
}

#[tokio::test]
async fn test_upload_requires_package() {
    let fixture = Fixture::new();
    let err = fixture.live().upload("production").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PackageNotFound(_)));
    assert!(err.user_message().contains("Run export first"));
}

#[tokio::test]
async fn test_dry_run_upload_describes_expected_package() {
    let fixture = Fixture::new();
    let env = MapEnv::new().with(UPLOAD_PASSWORD_ENV, "s3cret-value");
    let orchestrator = fixture.orchestrator(ProcessRunner::dry_run(), env);

    let package = orchestrator.upload("production").await.unwrap();
    assert_eq!(package, fixture.root().join("build/App-export/App.ipa"));
    assert!(!fixture.root().join("reports").exists());
}

#[tokio::test]
async fn test_clean_removes_outputs() {
    let fixture = Fixture::new();
    let build = fixture.root().join("build");
    let reports = fixture.root().join("reports");
    fs::create_dir_all(build.join("App.xcarchive")).unwrap();
    fs::create_dir_all(&reports).unwrap();
    fs::write(reports.join("x.log"), "").unwrap();

    fixture.live().clean().await.unwrap();

    assert!(!build.exists());
    assert!(!reports.exists());
    assert!(fixture.root().join("tools").exists());
}

#[tokio::test]
async fn test_clean_tolerates_missing_dirs() {
    let fixture = Fixture::new();
    fixture.live().clean().await.unwrap();
}

#[tokio::test]
async fn test_clean_refuses_protected_directory() {
    let mut fixture = Fixture::new();
    fixture.settings.build_dir = PathBuf::from("/usr");

    let err = fixture.live().clean().await.unwrap_err();
    match &err {
        OrchestratorError::UnsafePathDeletion { path, .. } => assert_eq!(path, "/usr"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(Path::new("/usr").exists());
}

#[tokio::test]
async fn test_clean_checks_every_path_before_deleting() {
    let mut fixture = Fixture::new();
    // Reports are deletable but the "build" dir points at source code
    fixture.settings.build_dir = PathBuf::from("Sources");
    let sources = fixture.root().join("Sources");
    let reports = fixture.root().join("reports");
    fs::create_dir_all(&sources).unwrap();
    fs::create_dir_all(&reports).unwrap();

    let err = fixture.live().clean().await.unwrap_err();

    assert!(matches!(err, OrchestratorError::UnsafePathDeletion { .. }));
    assert!(sources.exists());
    assert!(reports.exists());
}

#[tokio::test]
async fn test_clean_refuses_lookalike_build_dir() {
    let mut fixture = Fixture::new();
    // A CI home directory whose name merely starts with "build"
    fixture.settings.build_dir = PathBuf::from("buildkite");
    let home = fixture.root().join("buildkite");
    fs::create_dir_all(&home).unwrap();
    fs::write(home.join(".profile"), "").unwrap();

    let err = fixture.live().clean().await.unwrap_err();

    assert!(matches!(err, OrchestratorError::UnsafePathDeletion { .. }));
    assert!(home.join(".profile").exists());
}

#[tokio::test]
async fn test_dry_run_still_enforces_safety_gate() {
    let mut fixture = Fixture::new();
    fixture.settings.reports_dir = PathBuf::from("/private/tmp/safe-reports");
    let orchestrator = fixture.orchestrator(ProcessRunner::dry_run(), MapEnv::new());
    let err = orchestrator.clean().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnsafePathDeletion { .. }));
}

#[tokio::test]
async fn test_failed_phase_surfaces_command_error() {
    let mut fixture = Fixture::new();
    fixture.settings.tools.xcodebuild = "false".to_string();

    let err = fixture
        .live()
        .run_tests("App", DESTINATION)
        .await
        .unwrap_err();

    match &err {
        OrchestratorError::Command(CommandError::ExecutionFailed(result)) => {
            assert_eq!(result.exit_code, 1);
            assert!(result.original_command.starts_with("false test-without-building"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.user_message().contains("exited with code 1"));
}

#[tokio::test]
async fn test_pinned_toolchain_sets_developer_dir() {
    let mut fixture = Fixture::new();
    let apps = fixture.root().join("Applications");
    let xcode = apps.join("Xcode-15.4.app");
    fs::create_dir_all(xcode.join("Contents")).unwrap();
    fs::write(xcode.join("Contents/version.txt"), "15.4\n").unwrap();
    fixture.settings.toolchain_version = Some("15.2".to_string());
    fixture.settings.discovery.index_command = "false".to_string();
    fixture.settings.discovery.applications_dir = apps;
    fixture.settings.discovery.version_command = "cat {app}/Contents/version.txt".to_string();

    let artifacts = fixture
        .live()
        .run_tests("App", DESTINATION)
        .await
        .unwrap();

    let log = fs::read_to_string(&artifacts.log_path).unwrap();
    let expected = format!("DEVELOPER_DIR={}", xcode.join("Contents/Developer").display());
    assert!(log.contains(&expected));
}

#[tokio::test]
async fn test_missing_pinned_toolchain_fails_before_running() {
    let mut fixture = Fixture::new();
    fixture.settings.toolchain_version = Some("9.9".to_string());
    fixture.settings.discovery.index_command = "false".to_string();
    fixture.settings.discovery.applications_dir = fixture.root().join("NoApps");

    let err = fixture
        .live()
        .run_tests("App", DESTINATION)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Toolchain(ToolchainError::VersionNotFound(ref v)) if v == "9.9"
    ));
    assert!(!fixture
        .root()
        .join("reports/test_App_iOSSimulator17.2iPhone15.log")
        .exists());
}
