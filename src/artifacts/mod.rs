//! Verbose-log artifact capture.
//!
//! The start and stop steps of one job run in separate processes, so the
//! chosen log file name travels between them through a well-known
//! environment variable: whichever step runs first generates the name and
//! exports it, the other reads it back. Capture itself is strictly
//! best-effort; a missing file is a no-op (verbosity 0 never requests one)
//! and upload or deletion failures warn without failing the workflow.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::ci;
use crate::config::LOCAL_LOGS_FILE_VAR;

/// Name and location of the binary's verbose log for this job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogFile {
    /// File name, also used as the artifact name.
    pub name: String,
    /// Full path underneath the install directory.
    pub path: Utf8PathBuf,
}

/// Errors raised by artifact store implementations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Raised when an artifact cannot be stored.
    #[error("failed to store artifact {name}: {message}")]
    Upload {
        /// Artifact name being stored.
        name: String,
        /// Description of the underlying failure.
        message: String,
    },
}

/// Response returned by a successful upload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadResponse {
    /// Name the artifact was stored under.
    pub artifact_name: String,
    /// Number of files stored.
    pub files_stored: usize,
}

/// Boxed future returned by [`ArtifactStore`] implementations.
pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<UploadResponse, ArtifactError>> + 'a>>;

/// Collaborator that persists files beyond the lifetime of the job's
/// workspace. Failures are reported but never abort the workflow.
pub trait ArtifactStore {
    /// Stores `files` under `name`; paths are reported relative to `root`.
    fn upload<'a>(
        &'a self,
        name: &'a str,
        files: &'a [Utf8PathBuf],
        root: &'a Utf8Path,
    ) -> UploadFuture<'a>;
}

/// Store that copies artifacts into a collection directory picked up by the
/// CI runner.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectoryStore {
    dir: Utf8PathBuf,
}

impl DirectoryStore {
    /// Creates a store writing into `dir`.
    #[must_use]
    pub const fn new(dir: Utf8PathBuf) -> Self {
        Self { dir }
    }
}

impl ArtifactStore for DirectoryStore {
    fn upload<'a>(
        &'a self,
        name: &'a str,
        files: &'a [Utf8PathBuf],
        _root: &'a Utf8Path,
    ) -> UploadFuture<'a> {
        Box::pin(async move {
            let failed = |message: String| ArtifactError::Upload {
                name: name.to_owned(),
                message,
            };
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|err| failed(err.to_string()))?;
            let mut stored = 0_usize;
            for file in files {
                let Some(file_name) = file.file_name() else {
                    continue;
                };
                let dest = self.dir.join(file_name);
                tokio::fs::copy(file, &dest)
                    .await
                    .map_err(|err| failed(err.to_string()))?;
                stored += 1;
            }
            Ok(UploadResponse {
                artifact_name: name.to_owned(),
                files_stored: stored,
            })
        })
    }
}

/// How a [`capture_if_present`] call concluded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CaptureOutcome {
    /// The log file existed and was handed to the store.
    Uploaded,
    /// The log file existed but no store was configured, or the upload
    /// failed; the file was still cleaned up.
    Discarded,
    /// No log file existed; nothing to do.
    NoLogFile,
}

/// Derives the log file name and path for this job, exporting the name so
/// the job's other steps agree on the same file.
///
/// An already-exported name wins over generating a new one, which is what
/// lets a stop step pick up the file its start step created.
///
/// # Errors
///
/// Returns [`ci::CiError`] when the name cannot be exported.
pub fn log_file_metadata(prefix: &str, install_dir: &Utf8Path) -> Result<LogFile, ci::CiError> {
    let name = ci::var(LOCAL_LOGS_FILE_VAR).unwrap_or_else(|| {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        format!("{prefix}_{}_{millis}.log", ci::job())
    });
    ci::export_variable(LOCAL_LOGS_FILE_VAR, &name)?;
    let path = install_dir.join(&name);
    Ok(LogFile { name, path })
}

/// Uploads the verbose log if one exists, then removes the local copy and
/// clears the cross-step variable.
///
/// Nothing in here is fatal: upload and deletion failures are warnings and a
/// missing file is silent, so this is safe to call unconditionally at the
/// end of a stop step.
pub async fn capture_if_present(
    store: Option<&dyn ArtifactStore>,
    log: &LogFile,
) -> CaptureOutcome {
    let outcome = if log.path.is_file() {
        upload_and_remove(store, log).await
    } else {
        CaptureOutcome::NoLogFile
    };

    if let Err(err) = ci::clear_variable(LOCAL_LOGS_FILE_VAR) {
        warn!(error = %err, "failed to clear the log file variable");
    }
    outcome
}

async fn upload_and_remove(store: Option<&dyn ArtifactStore>, log: &LogFile) -> CaptureOutcome {
    let root = log
        .path
        .parent()
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned);

    let uploaded = match store {
        Some(client) => {
            let files = [log.path.clone()];
            match client.upload(&log.name, &files, &root).await {
                Ok(response) => {
                    info!(
                        artifact = %response.artifact_name,
                        files = response.files_stored,
                        "tunnel log uploaded"
                    );
                    true
                }
                Err(err) => {
                    warn!(error = %err, "tunnel log upload failed; continuing");
                    false
                }
            }
        }
        None => {
            warn!(log = %log.path, "no artifact store configured; discarding tunnel log");
            false
        }
    };

    if let Err(err) = tokio::fs::remove_file(&log.path).await {
        warn!(log = %log.path, error = %err, "failed to remove local tunnel log");
    }

    if uploaded {
        CaptureOutcome::Uploaded
    } else {
        CaptureOutcome::Discarded
    }
}
