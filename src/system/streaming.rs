//! Concurrent draining of a child's stdout and stderr.
//!
//! # Architecture
//!
//! ```text
//!            child process
//!          stdout      stderr
//!            |            |
//!     [stdout drain]  [stderr drain]   (one task each)
//!            |            |
//!            +--> CapturedOutput <--+  (single Mutex)
//!            |            |
//!        OutputSink::on_stdout / on_stderr
//!
//!     [exit wait] --- child.wait() --- stop signal (watch) ---> both drains
//! ```
//!
//! The exit-wait controller is the only party that signals the drains, and
//! only after the process has exited. A drain that sees the signal keeps
//! reading until end-of-file, so output still sitting in the pipe is never
//! dropped.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

const READ_CHUNK_SIZE: usize = 8192;

/// Receives output chunks as they arrive.
///
/// Chunks of one stream are delivered in arrival order; there is no ordering
/// guarantee between stdout and stderr.
pub trait OutputSink: Send + Sync {
    fn on_stdout(&self, chunk: &[u8]);
    fn on_stderr(&self, chunk: &[u8]);

    /// Called once after both streams reached end-of-file.
    fn finish(&self) {}
}

/// Echoes each chunk to the matching console stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn on_stdout(&self, chunk: &[u8]) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(chunk);
        let _ = out.flush();
    }

    fn on_stderr(&self, chunk: &[u8]) {
        let mut err = io::stderr().lock();
        let _ = err.write_all(chunk);
        let _ = err.flush();
    }
}

/// Which pipe a drain is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Bytes captured from both pipes of one invocation.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    fn append(&mut self, kind: StreamKind, chunk: &[u8]) {
        match kind {
            StreamKind::Stdout => self.stdout.extend_from_slice(chunk),
            StreamKind::Stderr => self.stderr.extend_from_slice(chunk),
        }
    }

    pub fn into_strings(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

/// Shared accumulator handed to both drains.
pub type SharedCapture = Arc<Mutex<CapturedOutput>>;

/// Read `reader` to end-of-file, appending every chunk to `captured` and
/// forwarding it to `sink`.
///
/// Until `stop` fires the read races the signal; afterwards the drain reads
/// whatever is left without waiting on anything else.
pub async fn drain_stream<R>(
    mut reader: R,
    kind: StreamKind,
    captured: SharedCapture,
    sink: Arc<dyn OutputSink>,
    mut stop: watch::Receiver<bool>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut stopping = *stop.borrow();

    loop {
        let read = if stopping {
            reader.read(&mut buf).await?
        } else {
            tokio::select! {
                read = reader.read(&mut buf) => read?,
                _ = stop.changed() => {
                    // Either the controller saw the exit or it went away;
                    // both mean: drain what is left and finish.
                    stopping = true;
                    continue;
                }
            }
        };

        if read == 0 {
            log::trace!("[Runner] [STREAM] {:?} reached end of file", kind);
            return Ok(());
        }

        let chunk = &buf[..read];
        captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(kind, chunk);
        match kind {
            StreamKind::Stdout => sink.on_stdout(chunk),
            StreamKind::Stderr => sink.on_stderr(chunk),
        }
    }
}
