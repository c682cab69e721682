//! Binary entry point for the Burrow CLI.

use std::env::consts;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use burrow::config::{ACCESS_KEY_VAR, LOCAL_IDENTIFIER_VAR};
use burrow::{
    ArtifactStore, ConfigError, DirectoryStore, HttpFetcher, Operation, PlatformError, Settings,
    TokioCommandRunner, ToolCache, TunnelConfig, TunnelControl, TunnelError, ci,
    normalize_local_identifier, platform, verbosity_from_log_level,
};

mod cli;

use cli::{Cli, StartCommand, StopCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("environment error: {0}")]
    Ci(#[from] ci::CiError),
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Start(command) => start_command(command).await,
        Cli::Stop(command) => stop_command(command).await,
    }
}

async fn start_command(args: StartCommand) -> Result<(), CliError> {
    let settings = Settings::load_without_cli_args()?;
    let access_key = require_access_key()?;
    let local_identifier = args
        .local_identifier
        .as_deref()
        .and_then(normalize_local_identifier);

    if let Some(identifier) = &local_identifier {
        ci::export_variable(LOCAL_IDENTIFIER_VAR, identifier)?;
        info!(
            identifier = %identifier,
            "exported {LOCAL_IDENTIFIER_VAR}; use it in the test script as the local identifier"
        );
    }

    let config = TunnelConfig {
        access_key,
        operation: Operation::Start,
        local_identifier,
        extra_args: args.local_args,
        verbosity: verbosity_from_log_level(&args.log_level),
    };
    let control = build_control(config, settings)?;
    control.start(&HttpFetcher).await?;
    Ok(())
}

async fn stop_command(_args: StopCommand) -> Result<(), CliError> {
    let settings = Settings::load_without_cli_args()?;
    let access_key = require_access_key()?;

    let config = TunnelConfig {
        access_key,
        operation: Operation::Stop,
        local_identifier: ci::var(LOCAL_IDENTIFIER_VAR),
        extra_args: String::new(),
        verbosity: 0,
    };
    let store = settings
        .artifacts_dir
        .as_deref()
        .map(|dir| DirectoryStore::new(dir.into()));
    let control = build_control(config, settings)?;

    // Stop failures are warnings by design: an unclean shutdown must not
    // fail a CI job whose tests already completed.
    control.stop().await;
    control
        .collect_logs(store.as_ref().map(|dir| dir as &dyn ArtifactStore))
        .await;
    Ok(())
}

fn build_control(
    config: TunnelConfig,
    settings: Settings,
) -> Result<TunnelControl<TokioCommandRunner>, CliError> {
    let install_root = settings.resolved_install_root()?;
    let info = platform::resolve(consts::OS, consts::ARCH, &install_root)?;
    let cache = ToolCache::new(settings.resolved_cache_root()?);
    Ok(TunnelControl::new(
        config,
        settings,
        info,
        cache,
        TokioCommandRunner,
    ))
}

fn require_access_key() -> Result<String, CliError> {
    ci::var(ACCESS_KEY_VAR).ok_or(CliError::Config(ConfigError::MissingAccessKey))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    let message = redact_secret(&err.to_string(), ci::var(ACCESS_KEY_VAR).as_deref());
    writeln!(target, "error: {message}").ok();
}

/// Strips the access key from outgoing messages; binary output has been
/// observed to echo arguments back on some failure paths.
fn redact_secret(message: &str, secret: Option<&str>) -> String {
    match secret {
        Some(key) if !key.is_empty() => message.replace(key, "***"),
        _ => message.to_owned(),
    }
}

#[cfg(test)]
mod main_tests;
