//! Error type for the tunnel lifecycle.

use thiserror::Error;

use crate::cache::CacheError;
use crate::ci::CiError;
use crate::process::ProcessError;

/// Fatal errors raised while driving the tunnel binary.
///
/// Stop-path failures never appear here; they are downgraded to warnings so
/// a tunnel that cannot report a clean shutdown does not fail an otherwise
/// complete CI job.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Raised when the binary could not be installed.
    #[error(transparent)]
    Install(#[from] CacheError),
    /// Raised when the binary cannot be invoked at all.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// Raised when every start attempt has failed.
    #[error("the local tunnel could not be started; last error from the binary: {reason}")]
    StartFailed {
        /// Failure reason reported by the final attempt.
        reason: String,
    },
    /// Raised when the log-file name cannot be exported for later steps.
    #[error("failed to export the log file name: {0}")]
    LogExport(#[source] CiError),
}
