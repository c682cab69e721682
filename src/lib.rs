//! Core library for the Burrow CI tunnel tool.
//!
//! The crate manages the lifecycle of the BrowserStack Local tunnel binary
//! from inside a CI job: resolving the platform-specific download, installing
//! it into a versioned tool cache, starting it in daemon mode under a bounded
//! retry budget, stopping it without failing the job, and capturing its
//! verbose log as an artifact.

pub mod artifacts;
pub mod cache;
pub mod ci;
pub mod config;
pub mod platform;
pub mod process;
pub mod test_support;
pub mod tunnel;

pub use artifacts::{ArtifactStore, CaptureOutcome, DirectoryStore, LogFile, UploadResponse};
pub use cache::{CacheError, Fetcher, HttpFetcher, InstallOutcome, ToolCache};
pub use config::{
    ConfigError, Operation, Settings, TunnelConfig, normalize_local_identifier,
    verbosity_from_log_level,
};
pub use platform::{Platform, PlatformError, PlatformInfo, resolve};
pub use process::{CommandRunner, ProcessError, ProcessResult, TokioCommandRunner};
pub use tunnel::{RetryPolicy, StopOutcome, TunnelControl, TunnelError};
