use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sr_contracts::{FarmerId, ShardContractRecord, ValidationError};
use thiserror::Error;

use crate::queue::QueueError;

/// One scheduled proof-of-possession challenge.
///
/// Ordered by `scheduled_time` first so queues can pop the earliest audit;
/// the remaining fields break ties deterministically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditPlanEntry {
    pub hash: String,
    pub farmer_id: FarmerId,
    /// Position in the record's `challenges` (and `tree`).
    pub index: u64,
    /// Milliseconds since the epoch.
    pub scheduled_time: u64,
    pub is_final: bool,
    pub challenge: String,
}

impl AuditPlanEntry {
    /// Key identifying this audit across queues: `hash:<hash>:<farmer>:<index>`.
    pub fn audit_key(&self) -> String {
        format!("hash:{}:{}:{}", self.hash, self.farmer_id, self.index)
    }
}

impl PartialOrd for AuditPlanEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AuditPlanEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scheduled_time
            .cmp(&other.scheduled_time)
            .then_with(|| self.hash.cmp(&other.hash))
            .then_with(|| self.farmer_id.cmp(&other.farmer_id))
            .then_with(|| self.index.cmp(&other.index))
            .then_with(|| self.challenge.cmp(&other.challenge))
            .then_with(|| self.is_final.cmp(&other.is_final))
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("contract for shard '{hash}' farmer '{farmer_id}' has no challenges to schedule")]
    EmptySchedule { hash: String, farmer_id: FarmerId },
    #[error("cannot schedule invalid record: {0}")]
    Validation(#[from] ValidationError),
    #[error("audit queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Compute the audit timetable for one record.
///
/// Challenge `i` of `N` fires at `store_begin + (store_end - store_begin) * i / N`,
/// so the first audit lands on `store_begin`, entries are evenly spaced and
/// non-decreasing, and every entry falls before `store_end` (or on it, for a
/// zero-length window). Only the last entry is final.
pub fn schedule(record: &ShardContractRecord) -> Result<Vec<AuditPlanEntry>, ScheduleError> {
    record.validate()?;
    let count = record.challenges.len();
    if count == 0 {
        return Err(ScheduleError::EmptySchedule {
            hash: record.hash.clone(),
            farmer_id: record.farmer_id().to_string(),
        });
    }

    let begin = record.contract.store_begin;
    let span = u128::from(record.contract.store_end - begin);
    let total = count as u128;

    Ok(record
        .challenges
        .iter()
        .enumerate()
        .map(|(index, challenge)| {
            // offset <= span, which came from a u64.
            let offset = (span * index as u128 / total) as u64;
            AuditPlanEntry {
                hash: record.hash.clone(),
                farmer_id: record.farmer_id().to_string(),
                index: index as u64,
                scheduled_time: begin + offset,
                is_final: index == count - 1,
                challenge: challenge.clone(),
            }
        })
        .collect())
}
