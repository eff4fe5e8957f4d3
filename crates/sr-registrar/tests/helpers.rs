//! Shared fixtures and fault-injecting collaborators for registrar tests.
//!
//! Each integration test compiles this module separately, so some helpers may
//! look unused from one file or another.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sr_audit::{AuditPlanEntry, AuditQueue, MemAuditQueue, QueueError};
use sr_contracts::{ContractTerms, Meta, ShardContractRecord, StorageItem};
use sr_store::{
    ContractStore, MemStore, ReadPreference, RecordId, ShardListing, StoreError, StoreResult,
};
use tokio::sync::Notify;

pub const SHARD: &str = "5b6f2c9a1e";

pub fn terms(farmer: &str, begin: u64, end: u64) -> ContractTerms {
    ContractTerms {
        contract_type: "storj.contract".into(),
        renter_id: "renter-1".into(),
        renter_signature: "renter-sig".into(),
        farmer_id: farmer.into(),
        farmer_signature: format!("{farmer}-sig"),
        data_size: 4096,
        store_begin: begin,
        store_end: end,
        audit_count: 4,
        payment_storage_price: 10,
        payment_download_price: 2,
        payment_destination: "wallet-1".into(),
    }
}

/// Storage item with one contract per farmer, each carrying `challenges` seeds.
pub fn storage_item(farmers: &[&str], challenges: usize) -> StorageItem {
    let mut item = StorageItem::new(SHARD);
    for farmer in farmers {
        let seeds: Vec<String> = (0..challenges).map(|i| format!("{farmer}-seed-{i}")).collect();
        let leaves: Vec<String> = (0..challenges).map(|i| format!("{farmer}-leaf-{i}")).collect();
        let mut meta = Meta::new();
        meta.insert("farmer_region".into(), serde_json::json!(format!("region-{farmer}")));
        meta.insert("shard_index".into(), serde_json::json!(3));
        item.insert_farmer(terms(farmer, 1000, 2000), leaves, seeds, meta);
    }
    item
}

/// Memory store that refuses writes for selected farmers.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: MemStore,
    pub fail_farmers: BTreeSet<String>,
}

impl FailingStore {
    pub fn failing(farmers: &[&str]) -> Self {
        Self {
            inner: MemStore::new(),
            fail_farmers: farmers.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ContractStore for FailingStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        if self.fail_farmers.contains(record.farmer_id()) {
            return Err(StoreError::Unavailable(format!(
                "injected write failure for {}",
                record.farmer_id()
            )));
        }
        self.inner.put(record).await
    }

    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        self.inner.get_by_hash_from(hash, preference).await
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        self.inner.list_hashes().await
    }

    fn read_preference(&self) -> ReadPreference {
        self.inner.read_preference()
    }
}

/// Memory store whose writes take `delay` before landing.
#[derive(Clone)]
pub struct SlowStore {
    pub inner: MemStore,
    pub delay: Duration,
}

#[async_trait]
impl ContractStore for SlowStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(record).await
    }

    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        self.inner.get_by_hash_from(hash, preference).await
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        self.inner.list_hashes().await
    }

    fn read_preference(&self) -> ReadPreference {
        self.inner.read_preference()
    }
}

/// Memory store whose writes announce themselves on `entered` and then wait
/// for `release`.
#[derive(Clone, Default)]
pub struct GatedStore {
    pub inner: MemStore,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl ContractStore for GatedStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.put(record).await
    }

    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        self.inner.get_by_hash_from(hash, preference).await
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        self.inner.list_hashes().await
    }

    fn read_preference(&self) -> ReadPreference {
        self.inner.read_preference()
    }
}

/// Memory store whose writes run as detached tasks, landing `delay` later even
/// when the caller has stopped waiting.
#[derive(Clone)]
pub struct LaggingStore {
    pub inner: MemStore,
    pub delay: Duration,
}

#[async_trait]
impl ContractStore for LaggingStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        let inner = self.inner.clone();
        let record = record.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.put(&record).await
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))?
    }

    async fn get_by_hash_from(
        &self,
        hash: &str,
        preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        self.inner.get_by_hash_from(hash, preference).await
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        self.inner.list_hashes().await
    }

    fn read_preference(&self) -> ReadPreference {
        self.inner.read_preference()
    }
}

/// Memory queue that takes `delay` to accept batches for selected farmers.
#[derive(Clone, Default)]
pub struct SlowQueue {
    pub inner: MemAuditQueue,
    pub delay: Duration,
    pub slow_farmers: BTreeSet<String>,
}

impl SlowQueue {
    pub fn slow_for(farmers: &[&str], delay: Duration) -> Self {
        Self {
            inner: MemAuditQueue::new(),
            delay,
            slow_farmers: farmers.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[async_trait]
impl AuditQueue for SlowQueue {
    async fn add(&self, entries: Vec<AuditPlanEntry>) -> Result<(), QueueError> {
        if entries.iter().any(|e| self.slow_farmers.contains(&e.farmer_id)) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.add(entries).await
    }
}

/// Queue that is always down.
pub struct DownQueue;

#[async_trait]
impl AuditQueue for DownQueue {
    async fn add(&self, _entries: Vec<AuditPlanEntry>) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("injected queue outage".into()))
    }
}
