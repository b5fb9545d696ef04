mod api;
mod commands;
mod config;
mod consts;
mod download;
mod endpoint;
mod input;
mod job;
mod payload;
mod pipeline;
mod poller;
mod signer;
#[cfg(test)]
mod testutil;
mod util;
use crate::api::ApiClient;
use crate::commands::Command;
use crate::config::{Credentials, SecretsLocator};
use anyhow::Context;
use clap::Parser;
use std::io::{stderr, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt::time::OffsetTime, prelude::*};

/// Exit status used when the user interrupts a run with Ctrl-C
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Generate and process 3D models with the Hunyuan 3D cloud API
///
/// Credentials are read from a JSON secrets file containing `secret_id`,
/// `secret_key`, and optionally `region` and `endpoint`.  The file is
/// located via `--secrets`, then `$HY3D_SECRETS_PATH`, then
/// `./secrets.json`, then `~/.hy-3d-secrets.json`.
#[derive(Clone, Debug, Parser)]
#[command(version = env!("VERSION_WITH_GIT"))]
struct Arguments {
    /// Set logging level
    #[arg(
        short,
        long,
        global = true,
        default_value = "INFO",
        value_name = "ERROR|WARN|INFO|DEBUG|TRACE"
    )]
    log_level: Level,

    /// Read API credentials from the given secrets file, which must exist
    #[arg(long, global = true, value_name = "PATH")]
    secrets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

// See
// <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/time/struct.OffsetTime.html#method.local_rfc_3339>
// for an explanation of the main + #[tokio::main]run thing
fn main() -> anyhow::Result<ExitCode> {
    let args = Arguments::parse();
    let timer =
        OffsetTime::local_rfc_3339().context("failed to determine local timezone offset")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(stderr().is_terminal())
                .with_writer(stderr),
        )
        .with(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), args.log_level)
                .with_default(Level::INFO.min(args.log_level)),
        )
        .init();
    run(args)
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: Arguments) -> anyhow::Result<ExitCode> {
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        git_commit = option_env!("GIT_COMMIT"),
        "Starting"
    );
    let credentials = Credentials::load(&SecretsLocator::from_env(args.secrets))
        .context("failed to load API credentials")?;
    tracing::debug!(
        region = %credentials.region,
        endpoint = %credentials.endpoint,
        "Loaded API credentials"
    );
    let client = ApiClient::new(credentials).context("failed to initialize API client")?;
    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received; aborting ...");
                token.cancel();
            }
        }
    });
    match token.run_until_cancelled(args.command.run(&client)).await {
        Some(r) => r.map(|()| ExitCode::SUCCESS),
        None => {
            tracing::warn!("Interrupted by user");
            Ok(ExitCode::from(INTERRUPTED_EXIT_CODE))
        }
    }
}
