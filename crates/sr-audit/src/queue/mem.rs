use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{AuditQueue, QueueError};
use crate::AuditPlanEntry;

/// In-memory min-heap of audits ordered by scheduled time.
///
/// Clones share the same heap, so a test can keep a handle while the
/// scheduler owns another.
#[derive(Debug, Default, Clone)]
pub struct MemAuditQueue {
    heap: Arc<Mutex<BinaryHeap<Reverse<AuditPlanEntry>>>>,
}

impl MemAuditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BinaryHeap<Reverse<AuditPlanEntry>>>, QueueError> {
        self.heap
            .lock()
            .map_err(|_| QueueError::Unavailable("audit queue lock poisoned".into()))
    }

    /// Earliest pending audit.
    pub fn peek(&self) -> Result<Option<AuditPlanEntry>, QueueError> {
        Ok(self.lock()?.peek().map(|Reverse(e)| e.clone()))
    }

    /// Remove and return every audit due at or before `now`, earliest first.
    pub fn pop_due(&self, now: u64) -> Result<Vec<AuditPlanEntry>, QueueError> {
        let mut heap = self.lock()?;
        let mut due = Vec::new();
        while heap.peek().is_some_and(|Reverse(e)| e.scheduled_time <= now) {
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(entry);
            }
        }
        Ok(due)
    }

    /// Remove every pending audit, earliest first.
    pub fn drain(&self) -> Result<Vec<AuditPlanEntry>, QueueError> {
        let mut all: Vec<_> = self.lock()?.drain().map(|Reverse(e)| e).collect();
        all.sort();
        Ok(all)
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.lock()?.is_empty())
    }
}

#[async_trait]
impl AuditQueue for MemAuditQueue {
    async fn add(&self, entries: Vec<AuditPlanEntry>) -> Result<(), QueueError> {
        let mut heap = self.lock()?;
        let added = entries.len();
        heap.extend(entries.into_iter().map(Reverse));
        debug!(added, pending = heap.len(), "queued audits");
        Ok(())
    }
}
