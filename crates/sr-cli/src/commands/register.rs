//! `srctl register` command.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value, json};
use sr_contracts::StorageItem;
use sr_registrar::cancellation;

use crate::opts::RootOpts;
use crate::output::print_json;

use super::error_json;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Storage item JSON: `{hash, contracts, trees, challenges, meta}`
    pub file: PathBuf,
}

pub async fn cmd_register(opts: &RootOpts, args: &RegisterArgs) -> Result<ExitCode> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let item: StorageItem = serde_json::from_str(&raw)
        .with_context(|| format!("parse storage item from {}", args.file.display()))?;
    let registrar = opts.registrar()?;

    let (handle, signal) = cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, pending farmer pipelines will not start");
            handle.cancel();
        }
    });
    let result = registrar.register_with_cancel(item, &signal).await;
    interrupt.abort();

    let mut farmers = Map::new();
    for (farmer_id, outcome) in &result.outcomes {
        let entry = match outcome {
            Ok(contract) => json!({
                "ok": true,
                "record_id": contract.record_id.to_string(),
                "audits_queued": contract.audits_queued,
            }),
            Err(err) => {
                let mut failure = error_json(err);
                failure["ok"] = Value::Bool(false);
                failure
            }
        };
        farmers.insert(farmer_id.clone(), entry);
    }
    print_json(
        opts,
        &json!({
            "hash": result.hash,
            "succeeded": result.success_count(),
            "failed": result.failure_count(),
            "farmers": farmers,
        }),
    )?;

    Ok(if result.any_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
