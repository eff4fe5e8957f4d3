//! Global CLI options and backend resolution.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sr_audit::FsAuditQueue;
use sr_registrar::{Registrar, RegistrarConfig};
use sr_store::FsStore;

#[derive(Args, Debug, Clone)]
pub struct RootOpts {
    /// Registry root holding `.contracts/` and `audits/` (env: SR_ROOT)
    #[arg(short = 'r', long, global = true, env = "SR_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl RootOpts {
    pub fn store(&self) -> Result<FsStore> {
        FsStore::open(&self.root)
            .with_context(|| format!("open contract store under {}", self.root.display()))
    }

    pub fn queue(&self) -> Result<FsAuditQueue> {
        FsAuditQueue::open(&self.root)
            .with_context(|| format!("open audit queue under {}", self.root.display()))
    }

    /// Registrar over the filesystem backends, tuned by `SR_*` variables.
    pub fn registrar(&self) -> Result<Registrar> {
        let config = RegistrarConfig::from_env().context("load registrar config")?;
        Ok(Registrar::new(
            Arc::new(self.store()?),
            Arc::new(self.queue()?),
            config,
        ))
    }
}
