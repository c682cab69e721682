//! Lifecycle orchestration for the local tunnel binary.
//!
//! `TunnelControl` sequences the full start path (ensure installed, build
//! arguments, run under the retry budget) and the single-attempt stop path.
//! Start failures are fatal once the budget is exhausted; stop failures are
//! downgraded to warnings so a tunnel that cannot report a clean shutdown
//! never fails an otherwise complete CI job.

use tracing::{info, warn};

use crate::artifacts::{self, ArtifactStore, CaptureOutcome};
use crate::cache::{Fetcher, InstallOutcome, ToolCache};
use crate::config::{Settings, TunnelConfig};
use crate::platform::PlatformInfo;
use crate::process::{CommandRunner, ProcessResult};

pub mod args;
mod error;
pub mod retry;
pub mod status;

pub use error::TunnelError;
pub use retry::{AttemptOutcome, RetryPolicy, Sleeper, TokioSleeper};

use retry::start_with_retry;
use status::{CONNECTED_STATE, STOP_SUCCESS_STATUS, parse_start, parse_stop};

/// Result of a stop request. Never fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StopOutcome {
    /// The binary confirmed a clean disconnect.
    Stopped(String),
    /// The stop did not complete cleanly; surfaced as a warning only.
    Warned(String),
}

impl StopOutcome {
    /// Message reported by the binary or the failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Stopped(message) | Self::Warned(message) => message,
        }
    }
}

/// Façade sequencing installs, starts, stops, and log capture for one
/// tunnel configuration.
pub struct TunnelControl<R: CommandRunner> {
    config: TunnelConfig,
    settings: Settings,
    platform: PlatformInfo,
    cache: ToolCache,
    runner: R,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl<R: CommandRunner> TunnelControl<R> {
    /// Creates a controller for one invocation.
    #[must_use]
    pub fn new(
        config: TunnelConfig,
        settings: Settings,
        platform: PlatformInfo,
        cache: ToolCache,
        runner: R,
    ) -> Self {
        let policy = RetryPolicy {
            max_attempts: settings.max_tries,
            delay: settings.retry_delay(),
        };
        Self {
            config,
            settings,
            platform,
            cache,
            runner,
            policy,
            sleeper: Box::new(TokioSleeper),
        }
    }

    /// Overrides the back-off clock.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Installs the tunnel binary if it is not already cached.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Install`] when download, extraction, or cache
    /// registration fails.
    pub async fn ensure_binary(&self, fetcher: &dyn Fetcher) -> Result<InstallOutcome, TunnelError> {
        let outcome = self
            .cache
            .ensure_installed(
                &self.settings.binary_name,
                &self.settings.binary_version,
                &self.platform,
                fetcher,
            )
            .await?;
        Ok(outcome)
    }

    /// Starts the tunnel in daemon mode, retrying within the attempt budget.
    ///
    /// Resolves with the binary's connection message once the reported state
    /// is connected.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError`] when installation fails, the binary cannot be
    /// spawned, the log file name cannot be exported, or every attempt in
    /// the budget fails.
    pub async fn start(&self, fetcher: &dyn Fetcher) -> Result<String, TunnelError> {
        self.ensure_binary(fetcher).await?;

        let log_file = if self.config.verbosity > 0 {
            Some(
                artifacts::log_file_metadata(
                    &self.settings.binary_name,
                    &self.platform.install_dir,
                )
                .map_err(TunnelError::LogExport)?,
            )
        } else {
            None
        };

        let argv = self.argv("start", log_file.as_ref().map(|log| log.path.as_path()));
        info!(
            identifier = self.config.local_identifier.as_deref().unwrap_or(""),
            "starting local tunnel in daemon mode"
        );

        let attempt = |_number: u32| {
            let runner = &self.runner;
            let binary = self.settings.binary_name.as_str();
            let argv = &argv;
            async move {
                let result = runner.run(binary, argv).await?;
                Ok(evaluate_start(&result))
            }
        };

        let message = start_with_retry(self.policy, self.sleeper.as_ref(), attempt).await?;
        info!(status = %message, "local tunnel connected");
        Ok(message)
    }

    /// Stops the tunnel with a single attempt.
    ///
    /// Failures of any kind, including a binary that cannot be spawned, are
    /// downgraded to [`StopOutcome::Warned`] and logged; the calling
    /// workflow continues either way.
    pub async fn stop(&self) -> StopOutcome {
        let argv = self.argv("stop", None);
        info!(
            identifier = self.config.local_identifier.as_deref().unwrap_or(""),
            "stopping local tunnel in daemon mode"
        );

        let outcome = match self.runner.run(&self.settings.binary_name, &argv).await {
            Ok(result) => evaluate_stop(&result),
            Err(err) => StopOutcome::Warned(err.to_string()),
        };

        match &outcome {
            StopOutcome::Stopped(message) => {
                info!(status = %message, "local tunnel stopped");
            }
            StopOutcome::Warned(message) => {
                warn!(
                    error = %message,
                    "error while stopping the local tunnel; continuing the workflow"
                );
            }
        }
        outcome
    }

    /// Uploads the verbose log for this job if one exists, then removes it.
    pub async fn collect_logs(&self, store: Option<&dyn ArtifactStore>) -> CaptureOutcome {
        let log = match artifacts::log_file_metadata(
            &self.settings.binary_name,
            &self.platform.install_dir,
        ) {
            Ok(log) => log,
            Err(err) => {
                warn!(error = %err, "failed to derive the log file name; skipping capture");
                return CaptureOutcome::NoLogFile;
            }
        };
        artifacts::capture_if_present(store, &log).await
    }

    fn argv(&self, subcommand: &str, log_file: Option<&camino::Utf8Path>) -> Vec<String> {
        let flags = args::build_args(&self.config, log_file);
        let mut argv: Vec<String> = flags.split_whitespace().map(str::to_owned).collect();
        argv.push(String::from("--daemon"));
        argv.push(subcommand.to_owned());
        argv
    }
}

/// Classifies one start invocation's output.
///
/// Non-empty stderr is the binary's own failure signal and takes precedence
/// over anything on stdout; otherwise the JSON payload decides, and output
/// that fails to parse is an attempt failure rather than a crash.
#[must_use]
pub fn evaluate_start(result: &ProcessResult) -> AttemptOutcome {
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        return AttemptOutcome::Failed(stderr.to_owned());
    }
    match parse_start(&result.stdout) {
        Ok(payload) if payload.state == CONNECTED_STATE => {
            AttemptOutcome::Connected(payload.message)
        }
        Ok(payload) => AttemptOutcome::Failed(payload.message),
        Err(err) => AttemptOutcome::Failed(err.to_string()),
    }
}

/// Classifies one stop invocation's output; same precedence rules as
/// [`evaluate_start`].
#[must_use]
pub fn evaluate_stop(result: &ProcessResult) -> StopOutcome {
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        return StopOutcome::Warned(stderr.to_owned());
    }
    match parse_stop(&result.stdout) {
        Ok(payload) if payload.status == STOP_SUCCESS_STATUS => {
            StopOutcome::Stopped(payload.message)
        }
        Ok(payload) => StopOutcome::Warned(payload.message),
        Err(err) => StopOutcome::Warned(err.to_string()),
    }
}
