//! `srctl recover` command.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::opts::RootOpts;
use crate::output::print_json;

use super::error_json;

#[derive(Args, Debug)]
pub struct RecoverArgs {
    /// Skip audits scheduled before this timestamp (ms)
    #[arg(long, value_name = "TS")]
    pub since: Option<u64>,
}

pub async fn cmd_recover(opts: &RootOpts, args: &RecoverArgs) -> Result<ExitCode> {
    let registrar = opts.registrar()?;
    let report = registrar.recover_audit_queue(args.since).await?;

    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|failure| {
            let mut value = error_json(&failure.error);
            value["hash"] = json!(failure.hash);
            value["farmer_id"] = json!(failure.farmer_id);
            value
        })
        .collect();
    print_json(
        opts,
        &json!({
            "records_scanned": report.records_scanned,
            "entries_queued": report.entries_queued,
            "failures": failures,
        }),
    )?;

    Ok(if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
