use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use sr_audit::{AuditScheduler, DynQueue};
use sr_contracts::{AggregatedShardView, FarmerId, ShardContractRecord, StorageItem, aggregate};
use sr_store::{DynStore, ReadPreference, RecordId};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::config::RegistrarConfig;
use crate::error::RegistrarError;

/// A farmer's contract that was persisted and had its audits queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredContract {
    pub record_id: RecordId,
    pub record: ShardContractRecord,
    pub audits_queued: usize,
}

pub type FarmerOutcome = Result<RegisteredContract, RegistrarError>;

/// Per-farmer report for one registration.
///
/// Whether partial success is acceptable is up to the caller.
#[derive(Debug)]
pub struct RegistrationResult {
    pub hash: String,
    pub outcomes: BTreeMap<FarmerId, FarmerOutcome>,
}

impl RegistrationResult {
    pub fn outcome(&self, farmer_id: &str) -> Option<&FarmerOutcome> {
        self.outcomes.get(farmer_id)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &RegisteredContract)> {
        self.outcomes
            .iter()
            .filter_map(|(farmer, outcome)| outcome.as_ref().ok().map(|c| (farmer.as_str(), c)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &RegistrarError)> {
        self.outcomes
            .iter()
            .filter_map(|(farmer, outcome)| outcome.as_ref().err().map(|e| (farmer.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn any_succeeded(&self) -> bool {
        self.success_count() > 0
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.failure_count() == 0
    }
}

/// Registers negotiated contracts and schedules their audits.
///
/// Each farmer runs its own pipeline (persist, plan, enqueue) as a spawned
/// task. A failure in one pipeline never affects another.
pub struct Registrar {
    store: DynStore,
    scheduler: AuditScheduler,
    config: RegistrarConfig,
    permits: Arc<Semaphore>,
}

impl Registrar {
    pub fn new(store: DynStore, queue: DynQueue, config: RegistrarConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_pipelines.max(1)));
        Self {
            store,
            scheduler: AuditScheduler::new(queue),
            config,
            permits,
        }
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub fn scheduler(&self) -> &AuditScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    pub async fn register(&self, item: StorageItem) -> RegistrationResult {
        self.register_with_cancel(item, &CancelSignal::never()).await
    }

    /// Register every farmer's contract in `item`.
    ///
    /// Once `cancel` fires, pipelines that have not started are reported as
    /// [`RegistrarError::Cancelled`]. Pipelines are detached tasks, so ones
    /// already running complete even if this future is dropped.
    ///
    /// A farmer reported as [`RegistrarError::StoreTimeout`] may still show up
    /// in the view later, since the abandoned write can land after the
    /// deadline. Its audits are then missing until
    /// [`Registrar::recover_audit_queue`] runs.
    pub async fn register_with_cancel(
        &self,
        item: StorageItem,
        cancel: &CancelSignal,
    ) -> RegistrationResult {
        let hash = item.hash.clone();
        let mut outcomes: BTreeMap<FarmerId, FarmerOutcome> = BTreeMap::new();
        let mut launched = Vec::new();

        for (farmer_id, built) in item.split() {
            let record = match built.and_then(|record| {
                record.validate_auditable()?;
                Ok(record)
            }) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%hash, %farmer_id, error = %err, "rejected contract before write");
                    outcomes.insert(farmer_id, Err(err.into()));
                    continue;
                }
            };
            if cancel.is_cancelled() {
                outcomes.insert(farmer_id, Err(RegistrarError::Cancelled));
                continue;
            }
            let pipeline = Pipeline {
                store: self.store.clone(),
                scheduler: self.scheduler.clone(),
                config: self.config.clone(),
                permits: self.permits.clone(),
                cancel: cancel.clone(),
            };
            launched.push((farmer_id, tokio::spawn(pipeline.run(record))));
        }

        let (farmers, handles): (Vec<_>, Vec<_>) = launched.into_iter().unzip();
        for (farmer_id, joined) in farmers.into_iter().zip(join_all(handles).await) {
            let outcome = joined.unwrap_or_else(|err| Err(RegistrarError::Task(err.to_string())));
            if let Err(err) = &outcome {
                warn!(%hash, %farmer_id, kind = err.kind(), error = %err, "farmer pipeline failed");
            }
            outcomes.insert(farmer_id, outcome);
        }

        let result = RegistrationResult { hash, outcomes };
        info!(
            hash = %result.hash,
            succeeded = result.success_count(),
            failed = result.failure_count(),
            "registered shard contracts"
        );
        result
    }

    /// Farmer-indexed view of every contract stored for `hash`, read with the
    /// store's configured read preference.
    pub async fn get_aggregated_view(&self, hash: &str) -> Result<AggregatedShardView, RegistrarError> {
        let records = self.store.get_by_hash(hash).await?;
        Ok(aggregate(records)?)
    }

    /// Like [`get_aggregated_view`](Self::get_aggregated_view) with an explicit
    /// read preference; use [`ReadPreference::Primary`] to see your own writes.
    pub async fn get_aggregated_view_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> Result<AggregatedShardView, RegistrarError> {
        let records = self.store.get_by_hash_from(hash, preference).await?;
        Ok(aggregate(records)?)
    }
}

struct Pipeline {
    store: DynStore,
    scheduler: AuditScheduler,
    config: RegistrarConfig,
    permits: Arc<Semaphore>,
    cancel: CancelSignal,
}

impl Pipeline {
    async fn run(self, record: ShardContractRecord) -> FarmerOutcome {
        // Waiting for a permit still counts as not started.
        let _permit = self
            .permits
            .acquire_owned()
            .await
            .map_err(|_| RegistrarError::Cancelled)?;
        if self.cancel.is_cancelled() {
            return Err(RegistrarError::Cancelled);
        }

        let record_id = match timeout(self.config.store_timeout, self.store.put(&record)).await {
            Ok(written) => written?,
            Err(_) => {
                return Err(RegistrarError::StoreTimeout {
                    after: self.config.store_timeout,
                });
            }
        };
        debug!(hash = %record.hash, farmer_id = %record.farmer_id(), %record_id, "persisted contract");

        let entries = self.scheduler.plan(&record)?;
        let audits_queued =
            match timeout(self.config.queue_timeout, self.scheduler.submit_entries(entries)).await {
                Ok(submitted) => submitted?,
                Err(_) => {
                    return Err(RegistrarError::QueueTimeout {
                        after: self.config.queue_timeout,
                    });
                }
            };
        debug!(hash = %record.hash, farmer_id = %record.farmer_id(), audits_queued, "queued audits");

        Ok(RegisteredContract {
            record_id,
            record,
            audits_queued,
        })
    }
}
