use std::time::Duration;

use sr_audit::{QueueError, ScheduleError};
use sr_contracts::{AggregateError, FarmerId, ValidationError};
use sr_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("contract for shard '{hash}' farmer '{farmer_id}' is already registered")]
    Duplicate { hash: String, farmer_id: FarmerId },
    #[error("no contracts found for shard '{hash}'")]
    NotFound { hash: String },
    #[error("persistence error: {0}")]
    Persistence(StoreError),
    /// The write was abandoned, not cancelled: it may still land, leaving a
    /// stored record with no queued audits. `Registrar::recover_audit_queue`
    /// re-plans such records.
    #[error("store write timed out after {after:?}")]
    StoreTimeout { after: Duration },
    #[error("audit queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("audit queue submission timed out after {after:?}")]
    QueueTimeout { after: Duration },
    #[error("contract for shard '{hash}' farmer '{farmer_id}' has no challenges to schedule")]
    EmptySchedule { hash: String, farmer_id: FarmerId },
    #[error("aggregation failed: {0}")]
    Aggregate(AggregateError),
    #[error("registration cancelled before this pipeline started")]
    Cancelled,
    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl RegistrarError {
    /// Coarse category for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistrarError::Validation(_) => "validation",
            RegistrarError::Duplicate { .. } => "duplicate",
            RegistrarError::NotFound { .. } => "not_found",
            RegistrarError::Persistence(_) | RegistrarError::StoreTimeout { .. } => "persistence",
            RegistrarError::Queue(_) | RegistrarError::QueueTimeout { .. } => "queue",
            RegistrarError::EmptySchedule { .. } => "empty_schedule",
            RegistrarError::Aggregate(AggregateError::EmptyAggregate) => "empty_aggregate",
            RegistrarError::Aggregate(_) => "aggregate",
            RegistrarError::Cancelled => "cancelled",
            RegistrarError::Task(_) => "task",
        }
    }
}

impl From<StoreError> for RegistrarError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(err) => RegistrarError::Validation(err),
            StoreError::Duplicate { hash, farmer_id } => RegistrarError::Duplicate { hash, farmer_id },
            StoreError::NotFound { hash } => RegistrarError::NotFound { hash },
            other => RegistrarError::Persistence(other),
        }
    }
}

impl From<ScheduleError> for RegistrarError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::EmptySchedule { hash, farmer_id } => {
                RegistrarError::EmptySchedule { hash, farmer_id }
            }
            ScheduleError::Validation(err) => RegistrarError::Validation(err),
            ScheduleError::Queue(err) => RegistrarError::Queue(err),
        }
    }
}

impl From<AggregateError> for RegistrarError {
    fn from(err: AggregateError) -> Self {
        RegistrarError::Aggregate(err)
    }
}
