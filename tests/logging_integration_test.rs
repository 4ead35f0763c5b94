use log::{Level, LevelFilter};
use shipwright::{EnvironmentOverrides, LogCollector, LogLine, ProcessRunner};
use std::fs;

/// Integration test for the logging system
///
/// Tests that:
/// 1. LogCollector creates its session file
/// 2. Records sent through the `log` facade reach disk
/// 3. Runner diagnostics are persisted with masked secrets
/// 4. wait_for_empty flushes everything queued before it
///
/// The global logger can only be installed once per process, so the whole
/// cycle lives in one test.
#[tokio::test]
async fn test_logging_integration_full_cycle() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let log_dir = temp_dir.path().join("logs");

    let collector =
        LogCollector::new(&log_dir, LevelFilter::Off).expect("Failed to initialize LogCollector");
    collector.install().expect("Failed to install logger");

    let session = collector.session_log_path().to_path_buf();
    assert!(session.exists(), "Session log should exist");
    let file_name = session.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("shipwright_") && file_name.ends_with(".log"));

    // Test 1: facade records
    log::info!("[Main] Test log message 1");
    log::warn!("[Main] Test log message 2");
    log::debug!("[Main] Debug detail");

    // Test 2: direct lines
    collector.log_line(LogLine::new(Level::Error, "[Main] Direct line"));

    // Test 3: verbose runner output goes through the facade with secrets masked
    let runner = ProcessRunner::new(false, true);
    let mut env = EnvironmentOverrides::new();
    env.insert("UPLOAD_TOKEN".to_string(), "tok-123456".to_string());
    runner
        .execute("true", None, &env)
        .await
        .expect("Failed to run command");

    collector.wait_for_empty().expect("Flush failed");

    let content = fs::read_to_string(&session).expect("Failed to read log file");
    assert!(content.contains("[INFO] [Main] Test log message 1"));
    assert!(content.contains("[WARN] [Main] Test log message 2"));
    assert!(content.contains("[DEBUG] [Main] Debug detail"));
    assert!(content.contains("[ERROR] [Main] Direct line"));
    assert!(content.contains("[Runner] Executing: true [UPLOAD_TOKEN=***]"));
    assert!(
        !content.contains("tok-123456"),
        "Secret values must never reach the session log"
    );
}
