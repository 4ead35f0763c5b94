//! System module: process execution, output streaming, environment access
//! and the deletion safety gate.

pub mod command;
pub mod env;
pub mod line_buffer;
pub mod masking;
pub mod paths;
pub mod runner;
pub mod streaming;

pub use command::{shell_quote, ArgvCommand, ShellCommand};
pub use env::{EnvProvider, MapEnv, ProcessEnv};
pub use line_buffer::LineBuffer;
pub use paths::{SafetyCheckedPath, UnsafePathReason};
pub use runner::ProcessRunner;
pub use streaming::{ConsoleSink, OutputSink};
