use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::StorageItem;
use crate::record::{ContractTerms, FarmerId, Meta, ShardContractRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("cannot aggregate an empty record set")]
    EmptyAggregate,
    #[error("records span several shards ('{expected}' and '{found}')")]
    MixedHashes { expected: String, found: String },
    #[error("farmer '{farmer_id}' appears more than once for shard '{hash}'")]
    DuplicateFarmer { hash: String, farmer_id: FarmerId },
}

/// Contract terms annotated with the shard they cover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotatedTerms {
    #[serde(flatten)]
    pub terms: ContractTerms,
    pub data_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FarmerShardView {
    pub contract: AnnotatedTerms,
    pub tree: Vec<String>,
    pub challenges: Vec<String>,
    pub meta: Meta,
}

/// Every farmer's contract for one shard, keyed by farmer id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatedShardView {
    pub hash: String,
    pub farmers: BTreeMap<FarmerId, FarmerShardView>,
}

impl AggregatedShardView {
    pub fn farmer_ids(&self) -> impl Iterator<Item = &str> {
        self.farmers.keys().map(String::as_str)
    }

    pub fn get(&self, farmer_id: &str) -> Option<&FarmerShardView> {
        self.farmers.get(farmer_id)
    }

    pub fn len(&self) -> usize {
        self.farmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farmers.is_empty()
    }

    /// Rebuild the negotiation-layer shape this view was registered from.
    pub fn into_storage_item(self) -> StorageItem {
        let mut item = StorageItem::new(self.hash);
        for (farmer_id, view) in self.farmers {
            item.contracts.insert(farmer_id.clone(), view.contract.terms);
            item.trees.insert(farmer_id.clone(), view.tree);
            item.challenges.insert(farmer_id.clone(), view.challenges);
            item.meta.insert(farmer_id, view.meta);
        }
        item
    }
}

/// Merge the records stored for one shard into a farmer-indexed view.
///
/// The farmer id is the merge key, so the result does not depend on the order
/// of `records`.
pub fn aggregate<I>(records: I) -> Result<AggregatedShardView, AggregateError>
where
    I: IntoIterator<Item = ShardContractRecord>,
{
    let mut hash: Option<String> = None;
    let mut farmers = BTreeMap::new();

    for record in records {
        let ShardContractRecord {
            hash: record_hash,
            contract,
            tree,
            challenges,
            meta,
        } = record;

        match &hash {
            None => hash = Some(record_hash.clone()),
            Some(expected) if *expected != record_hash => {
                return Err(AggregateError::MixedHashes {
                    expected: expected.clone(),
                    found: record_hash,
                });
            }
            Some(_) => {}
        }

        let farmer_id = contract.farmer_id.clone();
        if farmers.contains_key(&farmer_id) {
            return Err(AggregateError::DuplicateFarmer {
                hash: record_hash,
                farmer_id,
            });
        }
        farmers.insert(
            farmer_id,
            FarmerShardView {
                contract: AnnotatedTerms {
                    terms: contract,
                    data_hash: record_hash,
                },
                tree,
                challenges,
                meta,
            },
        );
    }

    let hash = hash.ok_or(AggregateError::EmptyAggregate)?;
    Ok(AggregatedShardView { hash, farmers })
}
