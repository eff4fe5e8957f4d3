use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::{ContractTerms, FarmerId, Meta, ShardContractRecord, ValidationError};

/// A negotiated, multi-farmer contract aggregate for one shard.
///
/// The four maps are keyed by farmer id. They normally share one key set; a
/// farmer missing from `trees`, `challenges` or `meta` is treated as having
/// empty data there.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageItem {
    pub hash: String,
    #[serde(default)]
    pub contracts: BTreeMap<FarmerId, ContractTerms>,
    #[serde(default)]
    pub trees: BTreeMap<FarmerId, Vec<String>>,
    #[serde(default)]
    pub challenges: BTreeMap<FarmerId, Vec<String>>,
    #[serde(default)]
    pub meta: BTreeMap<FarmerId, Meta>,
}

impl StorageItem {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            ..Self::default()
        }
    }

    /// Every farmer mentioned in any of the four maps.
    pub fn farmer_ids(&self) -> BTreeSet<&str> {
        self.contracts
            .keys()
            .chain(self.trees.keys())
            .chain(self.challenges.keys())
            .chain(self.meta.keys())
            .map(String::as_str)
            .collect()
    }

    /// Build the record this item describes for `farmer_id`.
    pub fn record_for(&self, farmer_id: &str) -> Result<ShardContractRecord, ValidationError> {
        let contract = self
            .contracts
            .get(farmer_id)
            .cloned()
            .ok_or_else(|| ValidationError::MissingTerms {
                farmer_id: farmer_id.to_string(),
            })?;
        if contract.farmer_id.is_empty() {
            return Err(ValidationError::MissingFarmerId {
                hash: self.hash.clone(),
            });
        }
        if contract.farmer_id != farmer_id {
            return Err(ValidationError::FarmerMismatch {
                key: farmer_id.to_string(),
                terms: contract.farmer_id,
            });
        }

        let record = ShardContractRecord::new(self.hash.clone(), contract)
            .with_audit_data(
                self.trees.get(farmer_id).cloned().unwrap_or_default(),
                self.challenges.get(farmer_id).cloned().unwrap_or_default(),
            )
            .with_meta(self.meta.get(farmer_id).cloned().unwrap_or_default());
        record.validate()?;
        Ok(record)
    }

    /// Split into one record (or validation failure) per farmer.
    pub fn split(&self) -> BTreeMap<FarmerId, Result<ShardContractRecord, ValidationError>> {
        self.farmer_ids()
            .into_iter()
            .map(|farmer_id| (farmer_id.to_string(), self.record_for(farmer_id)))
            .collect()
    }

    /// Add one farmer's full contract data.
    pub fn insert_farmer(
        &mut self,
        contract: ContractTerms,
        tree: Vec<String>,
        challenges: Vec<String>,
        meta: Meta,
    ) {
        let farmer_id = contract.farmer_id.clone();
        self.contracts.insert(farmer_id.clone(), contract);
        self.trees.insert(farmer_id.clone(), tree);
        self.challenges.insert(farmer_id.clone(), challenges);
        self.meta.insert(farmer_id, meta);
    }
}
