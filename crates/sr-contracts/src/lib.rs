//! Shard contract records, negotiation aggregates and the farmer-indexed shard view.
//!
//! A renter negotiates one contract per farmer for each shard it stores. The
//! negotiation layer hands those contracts over as a [`StorageItem`]; the
//! registry persists one [`ShardContractRecord`] per farmer and later rebuilds
//! an [`AggregatedShardView`] from whatever records share a shard hash.

mod aggregate;
mod item;
mod record;

pub use aggregate::{AggregateError, AggregatedShardView, AnnotatedTerms, FarmerShardView, aggregate};
pub use item::StorageItem;
pub use record::{ContractTerms, FarmerId, Meta, ShardContractRecord, ValidationError};
