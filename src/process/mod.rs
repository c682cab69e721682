//! Subprocess execution with full output capture.
//!
//! The tunnel binary signals success and failure exclusively through its
//! stdout JSON payload and its stderr stream, so the runner captures both in
//! full, waits for the process to exit, and deliberately ignores the exit
//! status.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

/// Captured output of one subprocess invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessResult {
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
}

/// Errors raised while invoking the tunnel binary.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Raised when the executable cannot be spawned or awaited.
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that could not be executed.
        program: String,
        /// Description of the underlying failure.
        message: String,
    },
}

/// Boxed future returned by [`CommandRunner`] implementations.
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<ProcessResult, ProcessError>> + 'a>>;

/// Abstraction over subprocess execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with `args`, capturing stdout and stderr until exit.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] when the program cannot be started.
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a>;
}

/// Production runner backed by [`tokio::process::Command`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            let output = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|err| ProcessError::Spawn {
                    program: program.to_owned(),
                    message: err.to_string(),
                })?;

            // Exit codes are ignored on purpose: the binary's own status
            // payload on stdout is the source of truth.
            Ok(ProcessResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}
