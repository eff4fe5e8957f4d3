//! `srctl audits` command.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};

use crate::opts::RootOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct AuditsArgs {
    /// Only audits scheduled at or before this timestamp (ms)
    #[arg(long, value_name = "TS")]
    pub due: Option<u64>,
}

pub fn cmd_audits(opts: &RootOpts, args: &AuditsArgs) -> Result<ExitCode> {
    let queue = opts.queue()?;
    let entries = match args.due {
        Some(now) => queue.due(now)?,
        None => queue.load_all()?,
    };
    let rendered = entries
        .iter()
        .map(|entry| -> Result<Value> {
            let mut value = serde_json::to_value(entry)?;
            value["key"] = Value::String(entry.audit_key());
            Ok(value)
        })
        .collect::<Result<Vec<_>>>()?;
    print_json(opts, &json!({ "count": rendered.len(), "entries": rendered }))?;
    Ok(ExitCode::SUCCESS)
}
