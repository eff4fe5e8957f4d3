//! `srctl view` command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::opts::RootOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Shard content hash
    pub hash: String,
}

pub async fn cmd_view(opts: &RootOpts, args: &ViewArgs) -> Result<ExitCode> {
    let registrar = opts.registrar()?;
    let view = registrar
        .get_aggregated_view(&args.hash)
        .await
        .with_context(|| format!("view shard {}", args.hash))?;
    print_json(opts, &serde_json::to_value(&view)?)?;
    Ok(ExitCode::SUCCESS)
}
