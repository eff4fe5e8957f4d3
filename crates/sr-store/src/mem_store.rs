use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use sr_contracts::{FarmerId, ShardContractRecord};

use crate::{ContractStore, ReadPreference, RecordId, ShardListing, StoreError, StoreResult};

type Shards = BTreeMap<String, BTreeMap<FarmerId, ShardContractRecord>>;

/// In-memory store with an optional lagging secondary replica.
///
/// Writes always land on the primary. The secondary only catches up when
/// [`replicate`](MemStore::replicate) is called, which lets tests observe the
/// stale reads a secondary-preferred backend can serve.
#[derive(Clone, Default)]
pub struct MemStore {
    primary: Arc<RwLock<Shards>>,
    secondary: Option<Arc<RwLock<Shards>>>,
    read_preference: ReadPreference,
}

impl fmt::Debug for MemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shards = self.primary.read().map(|g| g.len()).unwrap_or_default();
        f.debug_struct("MemStore")
            .field("shards", &shards)
            .field("replicated", &self.secondary.is_some())
            .field("read_preference", &self.read_preference)
            .finish()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a secondary replica, reading according to `read_preference`.
    pub fn with_replica(read_preference: ReadPreference) -> Self {
        Self {
            primary: Arc::default(),
            secondary: Some(Arc::default()),
            read_preference,
        }
    }

    /// Bring the secondary replica up to date with the primary.
    pub fn replicate(&self) -> StoreResult<()> {
        let Some(secondary) = &self.secondary else {
            return Ok(());
        };
        let snapshot = self.primary.read().map_err(poisoned)?.clone();
        *secondary.write().map_err(poisoned)? = snapshot;
        Ok(())
    }

    /// Number of records on the primary.
    pub fn len(&self) -> usize {
        self.primary
            .read()
            .map(|shards| shards.values().map(BTreeMap::len).sum())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn replica_for(&self, preference: ReadPreference) -> &RwLock<Shards> {
        match (preference, &self.secondary) {
            (ReadPreference::SecondaryPreferred, Some(secondary)) => secondary,
            _ => &self.primary,
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl ContractStore for MemStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        record.validate()?;
        let id = RecordId::for_record(record)?;
        let mut shards = self.primary.write().map_err(poisoned)?;
        let farmers = shards.entry(record.hash.clone()).or_default();
        if farmers.contains_key(record.farmer_id()) {
            return Err(StoreError::Duplicate {
                hash: record.hash.clone(),
                farmer_id: record.farmer_id().to_string(),
            });
        }
        farmers.insert(record.farmer_id().to_string(), record.clone());
        log::debug!("stored contract {id} for shard {} farmer {}", record.hash, record.farmer_id());
        Ok(id)
    }

    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        let shards = self.replica_for(preference).read().map_err(poisoned)?;
        match shards.get(hash) {
            Some(farmers) if !farmers.is_empty() => Ok(farmers.values().cloned().collect()),
            _ => Err(StoreError::NotFound {
                hash: hash.to_string(),
            }),
        }
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        let shards = self.primary.read().map_err(poisoned)?;
        let hashes = shards
            .iter()
            .filter(|(_, farmers)| !farmers.is_empty())
            .map(|(hash, _)| hash.clone())
            .collect();
        Ok(ShardListing {
            hashes,
            unreadable: Vec::new(),
        })
    }

    fn read_preference(&self) -> ReadPreference {
        self.read_preference
    }
}
