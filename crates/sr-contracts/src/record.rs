use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a storage provider node.
pub type FarmerId = String;

/// Free-form annotations attached to a farmer's record.
pub type Meta = BTreeMap<String, serde_json::Value>;

/// Signed terms governing how one farmer stores one shard.
///
/// Field names are the persisted layout and must not change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContractTerms {
    #[serde(rename = "type")]
    pub contract_type: String,
    pub renter_id: String,
    pub renter_signature: String,
    pub farmer_id: FarmerId,
    pub farmer_signature: String,
    pub data_size: u64,
    /// Start of the storage window, milliseconds since the epoch.
    pub store_begin: u64,
    /// End of the storage window, milliseconds since the epoch.
    pub store_end: u64,
    pub audit_count: u64,
    pub payment_storage_price: u64,
    pub payment_download_price: u64,
    pub payment_destination: String,
}

/// One farmer's contract for one shard, with the audit material needed to
/// challenge that farmer later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardContractRecord {
    pub hash: String,
    pub contract: ContractTerms,
    /// Merkle leaves, index-aligned with `challenges`.
    #[serde(default)]
    pub tree: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("shard hash is missing")]
    MissingHash,
    #[error("contract for shard '{hash}' has no farmer id")]
    MissingFarmerId { hash: String },
    #[error("farmer '{farmer_id}' has audit data but no contract terms")]
    MissingTerms { farmer_id: FarmerId },
    #[error("contract listed under farmer '{key}' names farmer '{terms}'")]
    FarmerMismatch { key: FarmerId, terms: FarmerId },
    #[error("farmer '{farmer_id}' has {tree} tree leaves but {challenges} challenges")]
    LengthMismatch {
        farmer_id: FarmerId,
        tree: usize,
        challenges: usize,
    },
    #[error("farmer '{farmer_id}' storage window ends ({store_end}) before it begins ({store_begin})")]
    InvertedWindow {
        farmer_id: FarmerId,
        store_begin: u64,
        store_end: u64,
    },
    #[error("farmer '{farmer_id}' has no audit challenges")]
    NoChallenges { farmer_id: FarmerId },
}

impl ShardContractRecord {
    pub fn new(hash: impl Into<String>, contract: ContractTerms) -> Self {
        Self {
            hash: hash.into(),
            contract,
            tree: Vec::new(),
            challenges: Vec::new(),
            meta: Meta::new(),
        }
    }

    pub fn with_audit_data(mut self, tree: Vec<String>, challenges: Vec<String>) -> Self {
        self.tree = tree;
        self.challenges = challenges;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn farmer_id(&self) -> &str {
        &self.contract.farmer_id
    }

    /// Check the structural invariants every stored record must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hash.trim().is_empty() {
            return Err(ValidationError::MissingHash);
        }
        if self.contract.farmer_id.trim().is_empty() {
            return Err(ValidationError::MissingFarmerId {
                hash: self.hash.clone(),
            });
        }
        if self.tree.len() != self.challenges.len() {
            return Err(ValidationError::LengthMismatch {
                farmer_id: self.contract.farmer_id.clone(),
                tree: self.tree.len(),
                challenges: self.challenges.len(),
            });
        }
        if self.contract.store_begin > self.contract.store_end {
            return Err(ValidationError::InvertedWindow {
                farmer_id: self.contract.farmer_id.clone(),
                store_begin: self.contract.store_begin,
                store_end: self.contract.store_end,
            });
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), and additionally require at least one
    /// challenge so the record can be audited.
    pub fn validate_auditable(&self) -> Result<(), ValidationError> {
        self.validate()?;
        if self.challenges.is_empty() {
            return Err(ValidationError::NoChallenges {
                farmer_id: self.contract.farmer_id.clone(),
            });
        }
        Ok(())
    }
}
