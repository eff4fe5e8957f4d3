mod commands;
mod opts;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::audits::AuditsArgs;
use commands::recover::RecoverArgs;
use commands::register::RegisterArgs;
use commands::view::ViewArgs;
use opts::RootOpts;

#[derive(Parser, Debug)]
#[command(name = "srctl", version, about = "Shard contract registry CLI")]
struct Cli {
    #[command(flatten)]
    opts: RootOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register every farmer contract in a storage item JSON file
    Register(RegisterArgs),

    /// Show the farmer-indexed view of a shard
    View(ViewArgs),

    /// List queued audits
    Audits(AuditsArgs),

    /// Rebuild the audit queue from stored contracts
    Recover(RecoverArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging();
    let opts = &cli.opts;

    match cli.command {
        Command::Register(args) => commands::register::cmd_register(opts, &args).await,
        Command::View(args) => commands::view::cmd_view(opts, &args).await,
        Command::Audits(args) => commands::audits::cmd_audits(opts, &args),
        Command::Recover(args) => commands::recover::cmd_recover(opts, &args).await,
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
