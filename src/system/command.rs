//! Command representations handed to the process runner.
//!
//! Two forms are kept apart on purpose:
//! - [`ShellCommand`]: a raw string interpreted by `/bin/sh -c`. Pipes,
//!   redirects and globbing work; interpolated values must be quoted with
//!   [`shell_quote`].
//! - [`ArgvCommand`]: a program plus an argument vector, executed without a
//!   shell. User-supplied text (commit messages, paths, tag names) goes here.

use std::fmt;

/// Shell used to interpret [`ShellCommand`] strings.
pub const SHELL: &str = "/bin/sh";

/// A command string interpreted by a POSIX shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand(String);

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        ShellCommand(command.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShellCommand {
    fn from(s: &str) -> Self {
        ShellCommand::new(s)
    }
}

impl From<String> for ShellCommand {
    fn from(s: String) -> Self {
        ShellCommand(s)
    }
}

/// A program and its arguments, executed without shell interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgvCommand {
    program: String,
    args: Vec<String>,
}

impl ArgvCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ArgvCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Human-readable rendering with every word shell-quoted.
    ///
    /// Only used for diagnostics and `CommandResult::original_command`;
    /// the runner never hands this string to a shell.
    pub fn display_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|word| shell_quote(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ArgvCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Quote a word for safe inclusion in a [`ShellCommand`].
///
/// Words made only of characters the shell never interprets are returned
/// unchanged; everything else is wrapped in single quotes with embedded
/// single quotes rewritten as `'\''`.
pub fn shell_quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
