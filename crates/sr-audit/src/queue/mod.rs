//! Audit queue boundary and the two bundled implementations.

pub mod fs;
pub mod mem;

use std::{io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::AuditPlanEntry;

pub type DynQueue = Arc<dyn AuditQueue>;

/// Durable hand-off point between planning and audit execution.
///
/// Entries are consumed later, in `scheduled_time` order, by an external
/// executor. A batch is accepted or rejected as a whole.
#[async_trait]
pub trait AuditQueue: Send + Sync {
    async fn add(&self, entries: Vec<AuditPlanEntry>) -> Result<(), QueueError>;
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("audit queue unavailable: {0}")]
    Unavailable(String),
    #[error("audit queue rejected batch: {0}")]
    Rejected(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("corrupt audit queue log: {0}")]
    Corrupt(String),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> QueueError {
    QueueError::Io {
        path: path.into(),
        source: err,
    }
}
