use sr_contracts::ShardContractRecord;
use tracing::debug;

use crate::plan::{AuditPlanEntry, ScheduleError, schedule};
use crate::queue::{DynQueue, QueueError};

/// Plans audits for persisted records and submits them to an injected queue.
///
/// The scheduler keeps nothing once a batch is handed off; the queue owns the
/// entries from then on.
#[derive(Clone)]
pub struct AuditScheduler {
    queue: DynQueue,
}

impl AuditScheduler {
    pub fn new(queue: DynQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &DynQueue {
        &self.queue
    }

    pub fn plan(&self, record: &ShardContractRecord) -> Result<Vec<AuditPlanEntry>, ScheduleError> {
        schedule(record)
    }

    /// Hand a computed batch to the queue. Returns the number of entries queued.
    pub async fn submit_entries(&self, entries: Vec<AuditPlanEntry>) -> Result<usize, QueueError> {
        let count = entries.len();
        self.queue.add(entries).await?;
        Ok(count)
    }

    /// Plan and submit in one step.
    pub async fn submit(&self, record: &ShardContractRecord) -> Result<usize, ScheduleError> {
        let entries = self.plan(record)?;
        let count = self.submit_entries(entries).await?;
        debug!(hash = %record.hash, farmer_id = %record.farmer_id(), count, "scheduled audits");
        Ok(count)
    }
}
