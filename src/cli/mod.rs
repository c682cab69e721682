//! Command-line interface definitions for the `burrow` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level CLI for the `burrow` binary.
#[derive(Debug, Parser)]
#[command(
    name = "burrow",
    about = "Manage the BrowserStack Local tunnel binary in CI jobs",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Download the tunnel binary if needed and start it in daemon mode.
    #[command(
        name = "start",
        about = "Install the tunnel binary if needed and start it in daemon mode"
    )]
    Start(StartCommand),
    /// Stop a previously started tunnel and collect its logs.
    #[command(
        name = "stop",
        about = "Stop a previously started tunnel and collect its logs"
    )]
    Stop(StopCommand),
}

/// Arguments accepted by `burrow start`.
#[derive(Debug, Parser)]
pub(crate) struct StartCommand {
    /// Correlation token routing test sessions through this tunnel; pass
    /// `random` to generate one.
    #[arg(long = "local-identifier")]
    pub local_identifier: Option<String>,

    /// Additional flags passed through to the tunnel binary, subject to the
    /// reserved-flag deny list.
    #[arg(long = "local-args", default_value = "")]
    pub local_args: String,

    /// Tunnel logging level: setup-logs, network-logs, all-logs, or false.
    #[arg(long = "log-level", default_value = "false")]
    pub log_level: String,
}

/// Arguments accepted by `burrow stop`.
///
/// The identifier is read back from the environment exported by the start
/// step, so the two steps always agree on which tunnel to stop.
#[derive(Debug, Parser)]
pub(crate) struct StopCommand {}
