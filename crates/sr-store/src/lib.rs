//! Durable per-farmer contract storage plus filesystem and in-memory backends.
//!
//! Records are keyed by `(hash, farmer_id)`. A record is written once and never
//! overwritten or deleted; it is the audit trail for the contract it holds.

pub mod codec;
mod fs_store;
mod mem_store;

pub use codec::{RecordId, to_canonical_cbor};
pub use fs_store::FsStore;
pub use mem_store::MemStore;

use std::{fmt, io, path::PathBuf, str::FromStr, sync::Arc};

use async_trait::async_trait;
use sr_contracts::{FarmerId, ShardContractRecord, ValidationError};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynStore = Arc<dyn ContractStore>;

/// Where reads are served from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadPreference {
    /// Always read the primary; sees every acknowledged write.
    #[default]
    Primary,
    /// Read a secondary replica when the backend has one. May lag writes.
    SecondaryPreferred,
}

impl FromStr for ReadPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ReadPreference::Primary),
            "secondary-preferred" | "secondaryPreferred" => Ok(ReadPreference::SecondaryPreferred),
            other => Err(format!("unknown read preference '{other}'")),
        }
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPreference::Primary => f.write_str("primary"),
            ReadPreference::SecondaryPreferred => f.write_str("secondary-preferred"),
        }
    }
}

/// Keyed, write-once storage for shard contract records.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Persist a new record. A single `put` is atomic.
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId>;

    /// All records stored for `hash`, ordered by farmer id.
    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>>;

    /// Every shard with at least one record, read from the primary.
    async fn list_hashes(&self) -> StoreResult<ShardListing>;

    /// Read preference used by [`get_by_hash`](Self::get_by_hash).
    fn read_preference(&self) -> ReadPreference;

    async fn get_by_hash(&self, hash: &str) -> StoreResult<Vec<ShardContractRecord>> {
        self.get_by_hash_from(hash, self.read_preference()).await
    }
}

/// Result of enumerating the shards a store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardListing {
    /// Hashes of readable shards, sorted.
    pub hashes: Vec<String>,
    /// Shards whose hash could not be read back from any of their records.
    pub unreadable: Vec<UnreadableShard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableShard {
    pub location: PathBuf,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
    #[error("record for shard '{hash}' and farmer '{farmer_id}' already exists")]
    Duplicate { hash: String, farmer_id: FarmerId },
    #[error("no records for shard '{hash}'")]
    NotFound { hash: String },
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("corrupt record at {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}
