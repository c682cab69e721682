//! Invocation configuration and layered tool settings.
//!
//! Two kinds of input meet here: the fixed environment contract shared with
//! the test steps of the same CI job (`BROWSERSTACK_*` variables), and
//! tunable tool settings loaded through `ortho-config` under the `BURROW`
//! prefix (binary name and version, retry budget, directory overrides).

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Variable carrying the tunnel access key into the job.
pub const ACCESS_KEY_VAR: &str = "BROWSERSTACK_ACCESS_KEY";
/// Variable sharing the local identifier between start, test, and stop steps.
pub const LOCAL_IDENTIFIER_VAR: &str = "BROWSERSTACK_LOCAL_IDENTIFIER";
/// Variable sharing the verbose-log file name between start and stop steps.
pub const LOCAL_LOGS_FILE_VAR: &str = "BROWSERSTACK_LOCAL_LOGS_FILE";

/// Plugin name reported to the tunnel binary and used as the prefix of
/// generated local identifiers.
pub const CI_PLUGIN_NAME: &str = "BurrowCI";

/// Runner tool-cache root exported by GitHub-style runners.
const RUNNER_TOOL_CACHE_VAR: &str = "RUNNER_TOOL_CACHE";

/// Lifecycle operation requested by the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Establish the tunnel in daemon mode.
    Start,
    /// Disconnect a previously started tunnel.
    Stop,
}

impl Operation {
    /// Subcommand passed to the binary after `--daemon`.
    #[must_use]
    pub const fn daemon_subcommand(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Validated input driving exactly one tunnel invocation sequence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelConfig {
    /// Tunnel access key. Secret: must never appear in logs or errors.
    pub access_key: String,
    /// Operation to perform.
    pub operation: Operation,
    /// Correlation token routing test sessions through this tunnel. The
    /// caller is responsible for keeping identifiers unique across
    /// concurrently running tunnels.
    pub local_identifier: Option<String>,
    /// Additional caller-supplied flags, filtered against the reserved-flag
    /// deny list before use.
    pub extra_args: String,
    /// Verbosity 0-3; zero disables the binary's log file entirely.
    pub verbosity: u8,
}

/// Tool settings with environment-overridable defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "BURROW")]
pub struct Settings {
    /// Name of the tunnel executable and of its tool-cache entry.
    #[ortho_config(default = "BrowserStackLocal".to_owned())]
    pub binary_name: String,
    /// Version recorded in the tool cache for the downloaded binary.
    #[ortho_config(default = "1.0.0".to_owned())]
    pub binary_version: String,
    /// Attempt budget for the start operation.
    #[ortho_config(default = 3)]
    pub max_tries: u32,
    /// Fixed delay between start attempts, in milliseconds.
    #[ortho_config(default = 5_000)]
    pub retry_delay_ms: u64,
    /// Overrides the directory the binary is downloaded into.
    pub install_root: Option<String>,
    /// Overrides the tool-cache root (defaults to the runner's tool cache).
    pub cache_root: Option<String>,
    /// Directory the verbose log is copied into for artifact collection.
    pub artifacts_dir: Option<String>,
}

/// Errors raised while assembling the invocation configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Raised when the access key variable is absent or empty.
    #[error("{ACCESS_KEY_VAR} is not set; the tunnel cannot authenticate without it")]
    MissingAccessKey,
    /// Raised when no home directory is available to derive the install root.
    #[error("neither HOME nor USERPROFILE is set and no install root override was given")]
    MissingHomeDirectory,
    /// Raised when layered settings fail to load.
    #[error("failed to load settings: {0}")]
    Settings(String),
}

impl Settings {
    /// Loads settings from defaults, configuration files, and environment
    /// variables, ignoring CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("burrow")])
            .map_err(|err| ConfigError::Settings(err.to_string()))
    }

    /// Directory the binary archive is downloaded into, before the
    /// platform-specific segment is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHomeDirectory`] when no override is set
    /// and the host exposes no home directory.
    pub fn resolved_install_root(&self) -> Result<Utf8PathBuf, ConfigError> {
        if let Some(root) = &self.install_root {
            return Ok(Utf8PathBuf::from(root));
        }
        let home = crate::ci::var("HOME")
            .or_else(|| crate::ci::var("USERPROFILE"))
            .ok_or(ConfigError::MissingHomeDirectory)?;
        Ok(Utf8PathBuf::from(home)
            .join("work")
            .join("binary")
            .join("LocalBinaryFolder"))
    }

    /// Root of the persistent tool cache shared across CI runs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHomeDirectory`] when no usable root can
    /// be derived.
    pub fn resolved_cache_root(&self) -> Result<Utf8PathBuf, ConfigError> {
        if let Some(root) = &self.cache_root {
            return Ok(Utf8PathBuf::from(root));
        }
        if let Some(runner_cache) = crate::ci::var(RUNNER_TOOL_CACHE_VAR) {
            return Ok(Utf8PathBuf::from(runner_cache));
        }
        Ok(self.resolved_install_root()?.join("_tool_cache"))
    }

    /// Delay between start attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

/// Normalises a caller-supplied local identifier.
///
/// Whitespace runs collapse to single hyphens and the result is lower-cased.
/// The literal token `random` (any case) is replaced with a freshly generated
/// identifier prefixed by the plugin name. Empty input yields `None`.
#[must_use]
pub fn normalize_local_identifier(input: &str) -> Option<String> {
    let collapsed = input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed == "random" {
        return Some(format!("{CI_PLUGIN_NAME}-{}", Uuid::new_v4()));
    }
    Some(collapsed)
}

/// Maps a named logging level to the binary's numeric verbosity.
///
/// `setup-logs`, `network-logs`, and `all-logs` map to 1-3; `false` and the
/// empty string disable logging. Any other value is reported as a warning
/// and treated as disabled so a typo never fails the step.
#[must_use]
pub fn verbosity_from_log_level(level: &str) -> u8 {
    match level.to_lowercase().as_str() {
        "" | "false" => 0,
        "setup-logs" => 1,
        "network-logs" => 2,
        "all-logs" => 3,
        other => {
            warn!(
                level = other,
                "invalid log level; no tunnel logs will be captured \
                 (valid values: setup-logs, network-logs, all-logs, false)"
            );
            0
        }
    }
}
