//! Session log pipeline behind the `log` facade.
//!
//! # Architecture
//!
//! ```text
//! log::info!() / log::warn!() / ...
//!     |
//! [LogCollector]  (Log impl, never blocks the caller)
//!     | (crossbeam unbounded channel)
//!     v
//! [writer thread] ---> logs/shipwright_<ts>.log   (every record)
//!                 \--> stderr                      (records at or above console level)
//! ```
//!
//! The writer is an OS thread rather than a tokio task so records emitted
//! from any runtime, or from no runtime at all, reach disk.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker; the sender is signalled once everything before it is on disk
    Flush(std::sync::mpsc::Sender<()>),
}

/// A log record ready for output.
#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
    /// `HH:MM:SS.mmm`
    pub timestamp: String,
}

impl LogLine {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogLine {
            level,
            message: message.into(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    fn format(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

/// Default logs directory: `./logs` under the current working directory.
pub fn default_logs_path() -> io::Result<PathBuf> {
    Ok(std::env::current_dir()?.join("logs"))
}

/// Logger persisting every record to a per-session file.
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    session_path: PathBuf,
    console_level: LevelFilter,
}

impl LogCollector {
    /// Create the logs directory and session file and start the writer thread.
    ///
    /// # Arguments
    /// * `log_dir` - Directory receiving `shipwright_<timestamp>.log`
    /// * `console_level` - Records at or above this level are echoed to stderr
    pub fn new(log_dir: &Path, console_level: LevelFilter) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let session_path = log_dir.join(format!(
            "shipwright_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_path)?;

        let (tx, rx) = unbounded::<LogMessage>();
        std::thread::spawn(move || {
            let mut writer: BufWriter<File> = BufWriter::new(file);
            while let Ok(message) = rx.recv() {
                match message {
                    LogMessage::Line(line) => {
                        let formatted = line.format();
                        let _ = writeln!(writer, "{}", formatted);
                        if line.level <= console_level {
                            eprintln!("{}", line.message);
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = writer.flush();
                        let _ = done.send(());
                    }
                }
            }
            let _ = writer.flush();
        });

        Ok(LogCollector {
            tx,
            session_path,
            console_level,
        })
    }

    /// Register a clone as the global `log` backend.
    ///
    /// The global max level is `Debug` so the session file captures detail
    /// regardless of what is echoed to the console.
    pub fn install(&self) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(LevelFilter::Debug.max(self.console_level));
        Ok(())
    }

    pub fn session_log_path(&self) -> &Path {
        &self.session_path
    }

    /// Queue a line; never blocks.
    pub fn log_line(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Block until every line queued before this call is written.
    pub fn wait_for_empty(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

impl Log for LogCollector {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.log_line(LogLine::new(record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {
        let _ = self.wait_for_empty();
    }
}
