//! Rebuilding the audit queue from stored contracts.
//!
//! Records are the durable source of truth and audit plans are a pure function
//! of a record, so a lost or partially fed queue can be refilled by planning
//! every stored record again.

use sr_contracts::FarmerId;
use sr_store::{ReadPreference, StoreError};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::RegistrarError;
use crate::registrar::Registrar;

#[derive(Debug)]
pub struct RecoveryFailure {
    /// Shard hash, or the storage location when the hash itself is unreadable.
    pub hash: String,
    /// `None` when the whole shard could not be read.
    pub farmer_id: Option<FarmerId>,
    pub error: RegistrarError,
}

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub records_scanned: usize,
    pub entries_queued: usize,
    pub failures: Vec<RecoveryFailure>,
}

impl Registrar {
    /// Re-plan every stored record and queue the audits scheduled at or after
    /// `since` (all of them when `None`). Records are read from the primary.
    pub async fn recover_audit_queue(&self, since: Option<u64>) -> Result<RecoveryReport, RegistrarError> {
        let listing = self.store().list_hashes().await?;
        let mut report = RecoveryReport::default();

        for shard in listing.unreadable {
            warn!(location = %shard.location.display(), reason = %shard.reason, "skipping unreadable shard");
            report.failures.push(RecoveryFailure {
                hash: shard.location.display().to_string(),
                farmer_id: None,
                error: StoreError::Corrupt {
                    path: shard.location,
                    reason: shard.reason,
                }
                .into(),
            });
        }

        for hash in listing.hashes {
            let records = match self
                .store()
                .get_by_hash_from(&hash, ReadPreference::Primary)
                .await
            {
                Ok(records) => records,
                Err(err) => {
                    warn!(%hash, error = %err, "could not read shard during recovery");
                    report.failures.push(RecoveryFailure {
                        hash,
                        farmer_id: None,
                        error: err.into(),
                    });
                    continue;
                }
            };

            for record in records {
                report.records_scanned += 1;
                let farmer_id = record.farmer_id().to_string();
                match self.requeue(&record, since).await {
                    Ok(count) => report.entries_queued += count,
                    Err(error) => {
                        warn!(%hash, %farmer_id, error = %error, "could not recover audits");
                        report.failures.push(RecoveryFailure {
                            hash: hash.clone(),
                            farmer_id: Some(farmer_id),
                            error,
                        });
                    }
                }
            }
        }

        info!(
            records = report.records_scanned,
            queued = report.entries_queued,
            failures = report.failures.len(),
            "recovered audit queue"
        );
        Ok(report)
    }

    async fn requeue(
        &self,
        record: &sr_contracts::ShardContractRecord,
        since: Option<u64>,
    ) -> Result<usize, RegistrarError> {
        let mut entries = self.scheduler().plan(record)?;
        if let Some(since) = since {
            entries.retain(|entry| entry.scheduled_time >= since);
        }
        if entries.is_empty() {
            return Ok(0);
        }
        let after = self.config().queue_timeout;
        match timeout(after, self.scheduler().submit_entries(entries)).await {
            Ok(submitted) => Ok(submitted?),
            Err(_) => Err(RegistrarError::QueueTimeout { after }),
        }
    }
}
