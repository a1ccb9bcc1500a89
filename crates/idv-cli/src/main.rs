//! # idv CLI entry point
//!
//! Parses command-line arguments, initializes logging, resolves the
//! configuration from the environment, and dispatches to the subcommand.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use idv_cli::config::{run_config, ConfigArgs};
use idv_cli::verify::{run_verify, VerifyArgs};
use idv_client::IdvConfig;

/// Identity verification session client.
///
/// Submits document and selfie captures to the verification backend and
/// reports the outcome. Configuration is read from `IDV_*` environment
/// variables.
#[derive(Parser, Debug)]
#[command(name = "idv", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a verification from image files.
    Verify(VerifyArgs),

    /// Print the resolved configuration with credentials redacted.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the -v level.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("idv CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match IdvConfig::from_env().context("failed to load configuration") {
        Ok(config) => match &cli.command {
            Commands::Verify(args) => run_verify(args, config).await,
            Commands::Config(args) => run_config(args, &config),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
