//! Interop with the CI runner's environment contract.
//!
//! CI steps within one job share state only through environment files: the
//! runner re-reads the file named by `GITHUB_ENV` to build the next step's
//! environment and the file named by `GITHUB_PATH` to extend its `PATH`.
//! This module mirrors that protocol while also updating the current
//! process's environment so the same invocation observes its own exports.

use std::env;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;

use camino::Utf8Path;
use thiserror::Error;

/// File listing variables exported to subsequent steps of the job.
const ENV_FILE_VAR: &str = "GITHUB_ENV";
/// File listing directories prepended to `PATH` for subsequent steps.
const PATH_FILE_VAR: &str = "GITHUB_PATH";
/// Identifier of the currently executing job.
const JOB_VAR: &str = "GITHUB_JOB";

/// Errors raised while writing to the runner's environment files.
#[derive(Debug, Error)]
pub enum CiError {
    /// Raised when an append to an environment file fails.
    #[error("failed to write {file}: {source}")]
    EnvFile {
        /// Path of the file that could not be written.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Exports `value` under `name` for this process and for later steps.
///
/// # Errors
///
/// Returns [`CiError::EnvFile`] when the runner's environment file exists but
/// cannot be appended to.
pub fn export_variable(name: &str, value: &str) -> Result<(), CiError> {
    // SAFETY: the tool performs a single lifecycle operation per process and
    // never mutates the environment from concurrent threads.
    unsafe { env::set_var(name, value) };
    append_line(ENV_FILE_VAR, &format!("{name}={value}"))
}

/// Clears `name` for this process and exports it empty for later steps.
///
/// # Errors
///
/// Returns [`CiError::EnvFile`] when the runner's environment file exists but
/// cannot be appended to.
pub fn clear_variable(name: &str) -> Result<(), CiError> {
    // SAFETY: see `export_variable`; mutation is single-threaded.
    unsafe { env::remove_var(name) };
    append_line(ENV_FILE_VAR, &format!("{name}="))
}

/// Prepends `dir` to `PATH` for this process and registers it for later steps.
///
/// # Errors
///
/// Returns [`CiError::EnvFile`] when the runner's path file exists but cannot
/// be appended to.
pub fn add_path(dir: &Utf8Path) -> Result<(), CiError> {
    let mut entries = vec![OsString::from(dir.as_str())];
    if let Some(current) = env::var_os("PATH") {
        entries.extend(env::split_paths(&current).map(OsString::from));
    }
    if let Ok(joined) = env::join_paths(entries) {
        // SAFETY: see `export_variable`; mutation is single-threaded.
        unsafe { env::set_var("PATH", joined) };
    }
    append_line(PATH_FILE_VAR, dir.as_str())
}

/// Returns the current job identifier, or `job` outside a CI run.
#[must_use]
pub fn job() -> String {
    var(JOB_VAR).unwrap_or_else(|| String::from("job"))
}

/// Reads a variable, treating empty values as absent.
#[must_use]
pub fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn append_line(file_var: &str, line: &str) -> Result<(), CiError> {
    // Outside a CI runner there is no environment file; the process-local
    // update above is all that is needed.
    let Some(file) = var(file_var) else {
        return Ok(());
    };
    let mut handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&file)
        .map_err(|source| CiError::EnvFile {
            file: file.clone(),
            source,
        })?;
    writeln!(handle, "{line}").map_err(|source| CiError::EnvFile { file, source })
}

#[cfg(test)]
mod tests;
